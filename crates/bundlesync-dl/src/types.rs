/// Download progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The transfer is about to begin. `total` is 0 when the size is unknown.
    Starting { total: u64 },
    Chunk { current: u64, total: u64 },
    Complete { total: u64 },
}
