use std::path::PathBuf;
use std::time::Duration;

use utils::normalized_path_from_user_string;

use crate::constants::{
    CONNECT_TIMEOUT, PROGRESS_MIN_INTERVAL, READ_TIMEOUT, STAGING_DIR, UPLOAD_FIELD_NAME, UPLOAD_STAGING_CHUNK_SIZE,
    USER_AGENT,
};

/// Settings shared by every transfer of one engine. The defaults come from the
/// `FS_BRIDGE_*` environment constants; individual values can be overridden.
#[derive(Clone, Debug)]
pub struct TransferConfig {
    pub staging_chunk_size: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub progress_interval: Duration,
    pub default_field_name: String,
    pub staging_dir: PathBuf,
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        let staging_dir = STAGING_DIR
            .as_deref()
            .map(normalized_path_from_user_string)
            .unwrap_or_else(std::env::temp_dir);

        Self {
            staging_chunk_size: (UPLOAD_STAGING_CHUNK_SIZE.as_u64() as usize).max(1),
            connect_timeout: *CONNECT_TIMEOUT,
            read_timeout: *READ_TIMEOUT,
            progress_interval: *PROGRESS_MIN_INTERVAL,
            default_field_name: UPLOAD_FIELD_NAME.clone(),
            staging_dir,
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl TransferConfig {
    pub fn with_progress_interval(self, progress_interval: Duration) -> Self {
        Self {
            progress_interval,
            ..self
        }
    }

    pub fn with_staging_dir(self, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            ..self
        }
    }

    pub fn with_timeouts(self, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            ..self
        }
    }

    pub fn with_staging_chunk_size(self, staging_chunk_size: usize) -> Self {
        Self {
            staging_chunk_size: staging_chunk_size.max(1),
            ..self
        }
    }
}
