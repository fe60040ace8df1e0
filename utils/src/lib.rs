#![cfg_attr(feature = "strict", deny(warnings))]

mod guards;
pub use guards::EnvVarGuard;

mod file_paths;
pub use file_paths::{looks_like_directory, normalized_path_from_user_string};

pub mod byte_size;
pub use byte_size::ByteSize;

pub mod configuration_utils;

// Macros configurable_constants! and test_set_constants! are exported at crate root by #[macro_export]
