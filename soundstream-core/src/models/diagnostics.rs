/// Counters for debugging a capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderDiagnostics {
    /// Periodic callbacks that reached a live device.
    pub periods: u64,
    pub samples_total: u64,
    pub bytes_emitted: u64,
    pub empty_reads: u64,
    pub read_errors: u64,
}
