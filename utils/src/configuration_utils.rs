use std::str::FromStr;

use tracing::{event, info, warn, Level};

use crate::ByteSize;

#[cfg(not(feature = "elevated_information_level"))]
pub const INFORMATION_LOG_LEVEL: Level = Level::DEBUG;
#[cfg(feature = "elevated_information_level")]
pub const INFORMATION_LOG_LEVEL: Level = Level::INFO;

/// A trait to control how a value is parsed from an environment string or other config source
/// if it's present.
pub trait ParsableConfigValue: std::fmt::Debug + Sized {
    fn parse_user_value(value: &str) -> Option<Self>;

    /// Parse the value, returning the default if it can't be parsed or the string is empty.
    /// Issue a warning if it can't be parsed.
    fn parse(variable_name: &str, value: Option<String>, default: Self) -> Self {
        match value {
            Some(v) => match Self::parse_user_value(&v) {
                Some(v) => {
                    info!("Config: {variable_name} = {v:?} (user set)");
                    v
                },
                None => {
                    warn!(
                        "Configuration value {v} for {variable_name} cannot be parsed into correct type; reverting to default."
                    );
                    info!("Config: {variable_name} = {default:?} (default due to parse error)");
                    default
                },
            },
            None => {
                event!(INFORMATION_LOG_LEVEL, "Config: {variable_name} = {default:?} (default)");
                default
            },
        }
    }
}

/// Most values work with the FromStr implementation, but we want to override the behavior for some types
/// (e.g. Option<T> and bool) to have custom parsing behavior.
pub trait FromStrParseable: FromStr + std::fmt::Debug {}

impl<T: FromStrParseable> ParsableConfigValue for T {
    fn parse_user_value(value: &str) -> Option<Self> {
        value.parse::<T>().ok()
    }
}

impl FromStrParseable for usize {}
impl FromStrParseable for u8 {}
impl FromStrParseable for u16 {}
impl FromStrParseable for u32 {}
impl FromStrParseable for u64 {}
impl FromStrParseable for isize {}
impl FromStrParseable for i32 {}
impl FromStrParseable for i64 {}
impl FromStrParseable for f64 {}
impl FromStrParseable for String {}
impl FromStrParseable for ByteSize {}

/// Special handling for bool:
/// - true: "1","true","yes","y","on"  -> true
/// - false: "0","false","no","n","off" -> false
fn parse_bool_value(value: &str) -> Option<bool> {
    let t = value.trim().to_ascii_lowercase();

    match t.as_str() {
        "0" | "false" | "no" | "n" | "off" => Some(false),
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        _ => None,
    }
}

impl ParsableConfigValue for bool {
    fn parse_user_value(value: &str) -> Option<Self> {
        parse_bool_value(value)
    }
}

/// Enable Option<T> to allow the default value to be None if nothing is set and appear as
/// Some(Value) if the user specifies the value.
impl<T: ParsableConfigValue> ParsableConfigValue for Option<T> {
    fn parse_user_value(value: &str) -> Option<Self> {
        T::parse_user_value(value).map(Some)
    }
}

/// Durations accept the suffixes understood by the duration_str crate, e.g. "250ms", "30s", "2m".
impl ParsableConfigValue for std::time::Duration {
    fn parse_user_value(value: &str) -> Option<Self> {
        duration_str::parse(value).ok()
    }
}

// Reexport this so that dependencies don't have weird other dependencies
pub use lazy_static::lazy_static;

/// Declares lazily initialized constants whose values may be overridden by
/// `FS_BRIDGE_<NAME>` environment variables.
///
/// ```ignore
/// utils::configurable_constants! {
///     /// Chunk size used when staging multipart bodies.
///     ref UPLOAD_STAGING_CHUNK_SIZE: usize = 64 * 1024;
/// }
/// ```
#[macro_export]
macro_rules! configurable_constants {
    ($(
        $(#[$meta:meta])*
        ref $name:ident : $type:ty = $value:expr;
    )+) => {
        $(
            #[allow(unused_imports)]
            use $crate::configuration_utils::*;

            lazy_static! {
                $(#[$meta])*
                pub static ref $name: $type = {
                    let default_value: $type = $value;
                    let maybe_env_value = std::env::var(concat!("FS_BRIDGE_", stringify!($name))).ok();
                    <$type>::parse(stringify!($name), maybe_env_value, default_value)
                };
            }
        )+
    };
}

pub use ctor as ctor_reexport;

#[cfg(not(doctest))]
/// A macro for **tests** that sets `FS_BRIDGE_<CONSTANT_NAME>` to `$value` **before**
/// the constant is initialized, and then checks that the constant actually picks up
/// that value. If the constant was already accessed (thus initialized), or if it
/// doesn't match after being set, this macro panics.
#[macro_export]
macro_rules! test_set_constants {
    ($(
        $var_name:ident = $val:expr;
    )+) => {
        use $crate::configuration_utils::ctor_reexport as ctor;

        #[ctor::ctor]
        fn set_constants_on_load() {
            $(
                let val = $val;
                let val_str = format!("{val:?}");

                let env_name = concat!("FS_BRIDGE_", stringify!($var_name));

                unsafe {
                    std::env::set_var(env_name, &val_str);
                }

                // Force lazy_static to be read now.
                let actual_value = *$var_name;

                if format!("{actual_value:?}") != val_str {
                    panic!(
                        "test_set_constants! failed: wanted {} to be {:?}, but got {:?}",
                        stringify!($var_name),
                        val,
                        actual_value
                    );
                }
            )+
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serial_test::serial;

    use super::*;
    use crate::EnvVarGuard;

    crate::configurable_constants! {
        ref TEST_CHUNK_SIZE: usize = 4096;
        ref TEST_TIMEOUT: Duration = Duration::from_secs(5);
        ref TEST_STAGING_DIR: Option<String> = None;
        ref TEST_READ_LIMIT: ByteSize = ByteSize::new(1024 * 1024);
    }

    #[test]
    fn test_parse_bool_value() {
        for v in ["1", "true", "YES", " y ", "On"] {
            assert_eq!(parse_bool_value(v), Some(true), "{v}");
        }
        for v in ["0", "false", "No", "n", "OFF"] {
            assert_eq!(parse_bool_value(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool_value("maybe"), None);
    }

    #[test]
    fn test_parse_falls_back_to_default() {
        assert_eq!(usize::parse("X", Some("not a number".to_string()), 7), 7);
        assert_eq!(usize::parse("X", None, 7), 7);
        assert_eq!(usize::parse("X", Some("12".to_string()), 7), 12);
    }

    #[test]
    fn test_parse_option_and_duration() {
        assert_eq!(Option::<u64>::parse("X", Some("5".to_string()), None), Some(5));
        assert_eq!(Option::<u64>::parse("X", None, None), None);
        assert_eq!(Duration::parse("X", Some("250ms".to_string()), Duration::ZERO), Duration::from_millis(250));
        assert_eq!(Duration::parse("X", Some("2m".to_string()), Duration::ZERO), Duration::from_secs(120));
    }

    #[test]
    #[serial(default_config_env)]
    fn test_configurable_constants_read_env() {
        let _g1 = EnvVarGuard::set("FS_BRIDGE_TEST_CHUNK_SIZE", "1024");
        let _g2 = EnvVarGuard::set("FS_BRIDGE_TEST_TIMEOUT", "30s");
        let _g3 = EnvVarGuard::set("FS_BRIDGE_TEST_STAGING_DIR", "/tmp/staging");
        let _g4 = EnvVarGuard::set("FS_BRIDGE_TEST_READ_LIMIT", "2kb");

        assert_eq!(*TEST_CHUNK_SIZE, 1024);
        assert_eq!(*TEST_TIMEOUT, Duration::from_secs(30));
        assert_eq!(TEST_STAGING_DIR.as_deref(), Some("/tmp/staging"));
        assert_eq!(TEST_READ_LIMIT.as_u64(), 2048);
    }
}
