use std::io::Read;

use serde::Serialize;

use crate::lv::LogicalVolume;
use crate::vg::VolumeGroup;
use crate::{extract, report, Result};

/// One point-in-time observation of the volume groups and logical volumes on
/// the host. Nothing is shared between snapshots; compare them by name or uuid.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LvmState {
    vgs: Vec<VolumeGroup>,
    lvs: Vec<LogicalVolume>,
}

impl LvmState {
    pub fn new(vgs: Vec<VolumeGroup>, lvs: Vec<LogicalVolume>) -> Self {
        Self { vgs, lvs }
    }

    /// Decodes and extracts a report read from `reader`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let report = report::decode(reader)?;
        let (vgs, lvs) = extract::extract(&report)?;
        Ok(Self::new(vgs, lvs))
    }

    pub fn vgs(&self) -> &[VolumeGroup] {
        &self.vgs
    }
    pub fn lvs(&self) -> &[LogicalVolume] {
        &self.lvs
    }

    pub fn vg(&self, name: &str) -> Option<&VolumeGroup> {
        self.vgs.iter().find(|vg| vg.name() == name)
    }

    /// Looks up a logical volume by its `vg/lv` name.
    pub fn lv(&self, full_name: &str) -> Option<&LogicalVolume> {
        self.lvs.iter().find(|lv| lv.full_name() == full_name)
    }

    pub fn lvs_in<'a>(&'a self, vg_name: &'a str) -> impl Iterator<Item = &'a LogicalVolume> + 'a {
        self.lvs.iter().filter(move |lv| lv.vg_name() == vg_name)
    }

    /// The thin pool `lv` allocates from, if it is a thin volume and the pool
    /// is part of this snapshot.
    pub fn thin_pool_of(&self, lv: &LogicalVolume) -> Option<&LogicalVolume> {
        if lv.pool_lv().is_empty() {
            return None;
        }
        self.lvs
            .iter()
            .find(|pool| pool.vg_name() == lv.vg_name() && pool.name() == lv.pool_lv())
    }

    pub fn thin_volumes_of<'a>(&'a self, pool: &'a LogicalVolume) -> impl Iterator<Item = &'a LogicalVolume> + 'a {
        self.lvs_in(pool.vg_name()).filter(move |lv| lv.pool_lv() == pool.name())
    }

    pub fn into_parts(self) -> (Vec<VolumeGroup>, Vec<LogicalVolume>) {
        (self.vgs, self.lvs)
    }
}
