/// track status of a scan
///
/// Owned and mutated by the scanner alone. `byte_position` is whatever the
/// device last reported and is only advisory after a failed read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanState {
    /// blocks advanced past, by a successful read or a successful skip
    pub block_index: u64,
    pub byte_position: u64,
    /// failed block reads
    pub error_count: u64,
    /// 0 when the device size is unknown
    pub total_size: u64,
    pub last_reported_position: u64,
    /// failed reads in a row that did not move the device forward
    pub consecutive_stalls: u32,
}

impl ScanState {
    pub fn new(total_size: u64, byte_position: u64) -> Self {
        Self {
            total_size,
            byte_position,
            ..Self::default()
        }
    }

    /// position to show in a progress line, never behind an earlier one
    pub fn report_position(&self) -> u64 {
        self.byte_position.max(self.last_reported_position)
    }
}
