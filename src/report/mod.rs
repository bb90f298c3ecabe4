//! Decoding of `lvm fullreport --reportformat json` output.
//!
//! The decoded tree mirrors the report as lvm writes it: one [`ReportEntry`] per
//! element of the outer `report` array, each holding the five per-section item
//! lists. Field values are kept as raw text; turning them into numbers is left
//! to [`crate::extract`].

use std::collections::BTreeMap;
use std::io::{BufReader, Read};

use serde::de::IgnoredAny;
use serde::Deserialize;
use snafu::ResultExt;

use crate::{DecodeSnafu, Result};

pub(crate) mod field;

#[derive(Deserialize, Clone, Debug)]
pub struct Report {
    pub report: Vec<ReportEntry>,
}

/// One element of the outer `report` array.
///
/// All five sections must be present. `pv`, `pvseg` and `seg` are requested
/// with empty field lists, so lvm fills them with `{}` placeholders.
#[derive(Deserialize, Clone, Debug)]
pub struct ReportEntry {
    pub vg: Vec<VgItem>,
    pub pv: Vec<Placeholder>,
    pub lv: Vec<LvItem>,
    pub pvseg: Vec<Placeholder>,
    pub seg: Vec<Placeholder>,
}

/// An item of a section whose contents are never looked at.
pub type Placeholder = BTreeMap<String, IgnoredAny>;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct VgItem {
    #[serde(default, deserialize_with = "field::raw")]
    pub vg_name: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub vg_uuid: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub vg_size: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub vg_free: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct LvItem {
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_uuid: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_name: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_full_name: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_path: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_size: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_kernel_major: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_kernel_minor: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub origin: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub origin_size: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub pool_lv: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_tags: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub lv_attr: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub vg_name: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub data_percent: Option<String>,
    #[serde(default, deserialize_with = "field::raw")]
    pub metadata_percent: Option<String>,
}

/// Decodes a report from `reader`, consuming it incrementally.
///
/// Syntax errors, truncation, read failures and a top-level shape other than
/// `report: [{vg, pv, lv, pvseg, seg}]` all yield [`crate::Error::Decode`].
pub fn decode<R: Read>(reader: R) -> Result<Report> {
    let report: Report = serde_json::from_reader(BufReader::new(reader)).context(DecodeSnafu)?;
    tracing::trace!(?report);
    Ok(report)
}
