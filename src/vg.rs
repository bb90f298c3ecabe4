use serde::Serialize;

/// A volume group as seen in one report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeGroup {
    pub(crate) name: String,
    pub(crate) uuid: String,
    pub(crate) size: u64,
    pub(crate) free: u64,
}

impl VolumeGroup {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    /// Total capacity in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
    /// Unallocated capacity in bytes.
    pub fn free(&self) -> u64 {
        self.free
    }
    pub fn used(&self) -> u64 {
        self.size.saturating_sub(self.free)
    }
}
