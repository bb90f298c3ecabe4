use serde::Serialize;

/// A logical volume as seen in one report.
///
/// `pool_lv` and `origin` name other volumes of the same snapshot; they are not
/// resolved here, see [`crate::LvmState`] for lookups.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogicalVolume {
    pub(crate) uuid: String,
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) path: String,
    pub(crate) size: u64,
    pub(crate) major: u32,
    pub(crate) minor: u32,
    pub(crate) origin: String,
    pub(crate) origin_size: u64,
    pub(crate) pool_lv: String,
    pub(crate) tags: Vec<String>,
    pub(crate) attr: String,
    pub(crate) vg_name: String,
    pub(crate) data_percent: f64,
    pub(crate) metadata_percent: f64,
}

impl LogicalVolume {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// `vg/lv`
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    /// Device path, empty while the volume is inactive or internal to a pool.
    pub fn path(&self) -> &str {
        &self.path
    }
    pub fn size(&self) -> u64 {
        self.size
    }
    /// Kernel major number, 0 when the volume has no active device.
    pub fn major(&self) -> u32 {
        self.major
    }
    /// Kernel minor number, 0 when the volume has no active device.
    pub fn minor(&self) -> u32 {
        self.minor
    }
    pub fn origin(&self) -> &str {
        &self.origin
    }
    pub fn origin_size(&self) -> u64 {
        self.origin_size
    }
    pub fn pool_lv(&self) -> &str {
        &self.pool_lv
    }
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
    pub fn attr(&self) -> &str {
        &self.attr
    }
    pub fn vg_name(&self) -> &str {
        &self.vg_name
    }
    pub fn data_percent(&self) -> f64 {
        self.data_percent
    }
    pub fn metadata_percent(&self) -> f64 {
        self.metadata_percent
    }

    fn attr_char(&self, idx: usize) -> Option<u8> {
        self.attr.as_bytes().get(idx).copied()
    }

    // first attr char is the volume type, fifth the activation state
    // see lvs(8), "lv_attr bits"
    pub fn is_thin_pool(&self) -> bool {
        self.attr_char(0) == Some(b't')
    }
    pub fn is_thin_volume(&self) -> bool {
        self.attr_char(0) == Some(b'V')
    }
    pub fn is_active(&self) -> bool {
        self.attr_char(4) == Some(b'a')
    }
    pub fn is_snapshot(&self) -> bool {
        !self.origin.is_empty()
    }
}
