/// A snapshot of how far a single transfer has progressed.
///
/// `total_bytes` is 0 when the size of the transfer is not known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    pub fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    pub fn is_size_known(&self) -> bool {
        self.total_bytes > 0
    }

    /// Fraction of the transfer completed, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.is_size_known()
            .then(|| (self.bytes_transferred as f64 / self.total_bytes as f64).min(1.))
    }
}
