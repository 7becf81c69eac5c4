/// Point-in-time view of the concurrency gate.
///
/// Facts only; callers decide what to do with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflightSnapshot {
    pub max: usize,
    pub available: usize,
    pub in_use: usize,
}
