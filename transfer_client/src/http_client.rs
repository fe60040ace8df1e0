use error_printer::ErrorPrinter;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::TransferConfig;
use crate::error::{Result, TransferError};

/// Builds the client used for all transfers of an engine. Timeouts are idle timeouts;
/// a long transfer that keeps making progress never times out.
pub fn build_http_client(config: &TransferConfig) -> Result<Client> {
    debug!(
        "building http client: connect_timeout={:?} read_timeout={:?}",
        config.connect_timeout, config.read_timeout
    );
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| TransferError::ConfigurationError(format!("cannot build http client: {e}")))
        .log_error("building http client")
}

/// Parses a transfer target; only absolute http(s) URLs are accepted.
pub fn parse_transfer_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| TransferError::invalid_url(raw, e))?;

    match url.scheme() {
        "http" | "https" => {},
        other => return Err(TransferError::invalid_url(raw, format!("unsupported scheme {other:?}"))),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(TransferError::invalid_url(raw, "missing host"));
    }

    Ok(url)
}

/// Converts caller supplied header pairs, rejecting names or values HTTP cannot carry.
pub fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransferError::InvalidArguments(format!("invalid header name {name:?}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| TransferError::InvalidArguments(format!("invalid value for header {name:?}: {e}")))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

/// A header value for a file name. Names that are not plain visible ASCII are
/// percent-encoded.
pub(crate) fn file_name_header_value(file_name: &str) -> HeaderValue {
    // HeaderValue accepts obs-text bytes, so anything beyond visible ASCII is encoded.
    if file_name.bytes().all(|b| b == b' ' || b.is_ascii_graphic()) {
        if let Ok(value) = HeaderValue::from_str(file_name) {
            return value;
        }
    }
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
    // Percent-encoded output is always visible ASCII.
    HeaderValue::from_str(&encoded).unwrap_or_else(|_| HeaderValue::from_static("file"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transfer_url() {
        assert!(parse_transfer_url("https://example.com/upload").is_ok());
        assert!(parse_transfer_url(" http://127.0.0.1:8080/x?y=1 ").is_ok());

        for bad in ["", "not a url", "ftp://example.com/f", "file:///tmp/x", "mailto:a@b.c"] {
            let err = parse_transfer_url(bad).unwrap_err();
            assert!(matches!(err, TransferError::InvalidUrl { .. }), "{bad}: {err:?}");
        }
    }

    #[test]
    fn test_header_map() {
        let map = header_map(&[
            ("Authorization".to_owned(), "Bearer abc".to_owned()),
            ("X-Trace".to_owned(), "1".to_owned()),
            ("X-Trace".to_owned(), "2".to_owned()),
        ])
        .unwrap();
        assert_eq!(map["authorization"], "Bearer abc");
        assert_eq!(map.get_all("x-trace").iter().count(), 2);

        assert!(matches!(header_map(&[("bad name".to_owned(), "v".to_owned())]), Err(TransferError::InvalidArguments(_))));
        assert!(matches!(header_map(&[("X-A".to_owned(), "line\nbreak".to_owned())]), Err(TransferError::InvalidArguments(_))));
    }

    #[test]
    fn test_file_name_header_value() {
        assert_eq!(file_name_header_value("report.pdf"), "report.pdf");
        assert_eq!(file_name_header_value("résumé.pdf"), "r%C3%A9sum%C3%A9.pdf");
        assert_eq!(file_name_header_value("my report.pdf"), "my report.pdf");
        assert_eq!(file_name_header_value("tab\there.txt"), "tab%09here.txt");
    }
}
