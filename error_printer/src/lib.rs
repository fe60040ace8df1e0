use std::fmt::{Debug, Display};
use std::panic::Location;

use tracing::{debug, error, info, warn};

/// A helper trait to log errors as they pass through a call chain.
/// The logging call is made with the message and the error, and the
/// original value is handed back unchanged so the caller can keep
/// propagating it with `?`.
///
/// Example:
/// ```ignore
/// let file = File::open(path).log_error("opening staging file")?;
/// ```
pub trait ErrorPrinter {
    fn log_error<M: Display>(self, message: M) -> Self;

    fn warn_error<M: Display>(self, message: M) -> Self;

    fn debug_error<M: Display>(self, message: M) -> Self;

    fn info_error<M: Display>(self, message: M) -> Self;
}

impl<T, E: Debug> ErrorPrinter for Result<T, E> {
    /// If self is an Err(e), prints out the given string to tracing::error,
    /// appending "error: {e}" to the end of the message.
    #[track_caller]
    fn log_error<M: Display>(self, message: M) -> Self {
        if let Err(ref e) = self {
            let caller = get_caller();
            error!(caller, "{message}, error: {e:?}");
        }
        self
    }

    /// If self is an Err(e), prints out the given string to tracing::warn,
    /// appending "error: {e}" to the end of the message.
    #[track_caller]
    fn warn_error<M: Display>(self, message: M) -> Self {
        if let Err(ref e) = self {
            let caller = get_caller();
            warn!(caller, "{message}, error: {e:?}");
        }
        self
    }

    #[track_caller]
    fn debug_error<M: Display>(self, message: M) -> Self {
        if let Err(ref e) = self {
            let caller = get_caller();
            debug!(caller, "{message}, error: {e:?}");
        }
        self
    }

    #[track_caller]
    fn info_error<M: Display>(self, message: M) -> Self {
        if let Err(ref e) = self {
            let caller = get_caller();
            info!(caller, "{message}, error: {e:?}");
        }
        self
    }
}

/// A helper trait to log when an option is None.
pub trait OptionPrinter {
    fn error_none<M: Display>(self, message: M) -> Self;

    fn warn_none<M: Display>(self, message: M) -> Self;

    fn debug_none<M: Display>(self, message: M) -> Self;

    fn info_none<M: Display>(self, message: M) -> Self;
}

impl<T> OptionPrinter for Option<T> {
    #[track_caller]
    fn error_none<M: Display>(self, message: M) -> Self {
        if self.is_none() {
            let caller = get_caller();
            error!(caller, "{message}");
        }
        self
    }

    #[track_caller]
    fn warn_none<M: Display>(self, message: M) -> Self {
        if self.is_none() {
            let caller = get_caller();
            warn!(caller, "{message}");
        }
        self
    }

    #[track_caller]
    fn debug_none<M: Display>(self, message: M) -> Self {
        if self.is_none() {
            let caller = get_caller();
            debug!(caller, "{message}");
        }
        self
    }

    #[track_caller]
    fn info_none<M: Display>(self, message: M) -> Self {
        if self.is_none() {
            let caller = get_caller();
            info!(caller, "{message}");
        }
        self
    }
}

#[track_caller]
fn get_caller() -> String {
    let location = Location::caller();
    format!("{}:{}", location.file(), location.line())
}
