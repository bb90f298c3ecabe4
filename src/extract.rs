//! Conversion of decoded report items into [`VolumeGroup`]s and [`LogicalVolume`]s.
//!
//! lvm reports `-1` as kernel major/minor of a volume without an active device;
//! this is the only place that knows about it.

use std::collections::BTreeSet;

use nom::IResult;
use nom::character::complete::{i64, u64};
use nom::combinator::{all_consuming, map_res};
use nom::number::complete::recognize_float;
use snafu::OptionExt;

use crate::lv::LogicalVolume;
use crate::report::{LvItem, Report, VgItem};
use crate::vg::VolumeGroup;
use crate::{MalformedFieldSnafu, Result};

fn parse_u64(input: &str) -> IResult<&str, u64> {
    all_consuming(u64)(input)
}
fn parse_i64(input: &str) -> IResult<&str, i64> {
    all_consuming(i64)(input)
}
fn parse_f64(input: &str) -> IResult<&str, f64> {
    all_consuming(map_res(recognize_float, str::parse::<f64>))(input)
}

/// Runs `parser` over the raw value of `field`.
///
/// An absent field yields `absent`, so does an empty one if `empty_is_absent`.
fn typed<T>(
    field: &'static str,
    raw: &Option<String>,
    parser: fn(&str) -> IResult<&str, T>,
    absent: T,
    empty_is_absent: bool,
) -> Result<T> {
    let value = match raw.as_deref() {
        None => return Ok(absent),
        Some("") if empty_is_absent => return Ok(absent),
        Some(value) => value,
    };
    parser(value)
        .ok()
        .map(|(_, parsed)| parsed)
        .context(MalformedFieldSnafu { field, value })
}

fn text(raw: &Option<String>) -> String {
    raw.clone().unwrap_or_default()
}

fn device_number(field: &'static str, raw: &Option<String>) -> Result<u32> {
    let parsed = typed(field, raw, parse_i64, 0, false)?;
    if parsed < 0 {
        return Ok(0);
    }
    u32::try_from(parsed).ok().context(MalformedFieldSnafu {
        field,
        value: text(raw),
    })
}

fn tags(raw: &Option<String>) -> Vec<String> {
    match raw.as_deref() {
        None | Some("") => Vec::new(),
        Some(tags) => tags.split(',').map(str::to_owned).collect(),
    }
}

impl VolumeGroup {
    pub(crate) fn from_item(item: &VgItem) -> Result<Self> {
        Ok(Self {
            name: text(&item.vg_name),
            uuid: text(&item.vg_uuid),
            size: typed("vg_size", &item.vg_size, parse_u64, 0, false)?,
            free: typed("vg_free", &item.vg_free, parse_u64, 0, false)?,
        })
    }
}

impl LogicalVolume {
    pub(crate) fn from_item(item: &LvItem) -> Result<Self> {
        Ok(Self {
            uuid: text(&item.lv_uuid),
            name: text(&item.lv_name),
            full_name: text(&item.lv_full_name),
            path: text(&item.lv_path),
            size: typed("lv_size", &item.lv_size, parse_u64, 0, false)?,
            major: device_number("lv_kernel_major", &item.lv_kernel_major)?,
            minor: device_number("lv_kernel_minor", &item.lv_kernel_minor)?,
            origin: text(&item.origin),
            origin_size: typed("origin_size", &item.origin_size, parse_u64, 0, true)?,
            pool_lv: text(&item.pool_lv),
            tags: tags(&item.lv_tags),
            attr: text(&item.lv_attr),
            vg_name: text(&item.vg_name),
            data_percent: typed("data_percent", &item.data_percent, parse_f64, 0.0, true)?,
            metadata_percent: typed("metadata_percent", &item.metadata_percent, parse_f64, 0.0, true)?,
        })
    }
}

/// Flattens every report entry into one list of volume groups and one list of
/// logical volumes, in report order.
///
/// Any field that fails to parse fails the whole report.
pub fn extract(report: &Report) -> Result<(Vec<VolumeGroup>, Vec<LogicalVolume>)> {
    let vgs = report
        .report
        .iter()
        .flat_map(|entry| entry.vg.iter())
        .map(VolumeGroup::from_item)
        .collect::<Result<Vec<_>>>()?;
    let lvs = report
        .report
        .iter()
        .flat_map(|entry| entry.lv.iter())
        .map(LogicalVolume::from_item)
        .collect::<Result<Vec<_>>>()?;

    if report.report.len() > 1 {
        tracing::debug!(entries = report.report.len(), "combined multi-entry report");
    }
    check_consistency(&vgs, &lvs);
    Ok((vgs, lvs))
}

fn check_consistency(vgs: &[VolumeGroup], lvs: &[LogicalVolume]) {
    let mut vg_names = BTreeSet::new();
    for vg in vgs {
        if !vg_names.insert(vg.name()) {
            tracing::warn!(vg = vg.name(), "volume group reported twice");
        }
        if vg.free() > vg.size() {
            tracing::warn!(vg = vg.name(), size = vg.size(), free = vg.free(), "volume group has more free than total space");
        }
    }
    let mut lv_names = BTreeSet::new();
    for lv in lvs {
        if !lv_names.insert(lv.full_name()) {
            tracing::warn!(lv = lv.full_name(), "logical volume reported twice");
        }
        if !vg_names.contains(lv.vg_name()) {
            tracing::warn!(lv = lv.full_name(), vg = lv.vg_name(), "logical volume refers to an unknown volume group");
        }
    }
}
