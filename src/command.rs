//! How the report command is assembled.

use std::ffi::OsString;
use std::iter;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Volume group columns requested from lvm.
pub const VG_FIELDS: &str = "vg_name,vg_uuid,vg_size,vg_free";
/// Logical volume columns requested from lvm.
pub const LV_FIELDS: &str = "lv_uuid,lv_name,lv_full_name,lv_path,lv_size,\
    lv_kernel_major,lv_kernel_minor,origin,origin_size,pool_lv,lv_tags,\
    lv_attr,vg_name,data_percent,metadata_percent";

const NSENTER_PATH: &str = "/usr/bin/nsenter";

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Every value quoted.
    #[default]
    Json,
    /// Numbers unquoted, undefined values `null` (lvm 2.03.17+).
    JsonStd,
}

impl ReportFormat {
    fn as_arg(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::JsonStd => "json_std",
        }
    }
}

/// Settings for [`crate::retrieve`].
///
/// Deserializable with defaults for every key, so it can sit in a section of
/// the daemon's own configuration file.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    pub lvm_path: PathBuf,
    /// Run before `lvm_path`, e.g. an `nsenter` invocation when the daemon
    /// lives in a container but lvm has to see the host.
    pub command_prefix: Vec<String>,
    pub report_format: ReportFormat,
    pub timeout_secs: Option<u64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            lvm_path: PathBuf::from("/sbin/lvm"),
            command_prefix: Vec::new(),
            report_format: ReportFormat::default(),
            timeout_secs: None,
        }
    }
}

impl ReportConfig {
    /// Runs lvm inside the namespaces of the host's init process.
    pub fn containerized() -> Self {
        let prefix = [NSENTER_PATH, "-m", "-u", "-i", "-n", "-p", "-t", "1"];
        Self {
            command_prefix: prefix.into_iter().map(str::to_owned).collect(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Arguments passed to the lvm binary.
    pub fn report_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "fullreport",
            "--reportformat",
            self.report_format.as_arg(),
            "--units",
            "b",
            "--nosuffix",
            "--configreport",
            "vg",
            "-o",
            VG_FIELDS,
            "--configreport",
            "lv",
            "-o",
            LV_FIELDS,
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();
        // empty column lists, lvm still emits one `{}` per row
        for section in ["pv", "pvseg", "seg"] {
            args.extend(["--configreport".to_owned(), section.to_owned(), "-o,".to_owned()]);
        }
        args
    }

    /// The program to execute and its arguments.
    pub fn program_and_args(&self) -> (OsString, Vec<OsString>) {
        let lvm = self.lvm_path.clone().into_os_string();
        let report = self.report_args().into_iter().map(OsString::from);
        match self.command_prefix.split_first() {
            Some((program, prefix)) => (
                program.into(),
                prefix
                    .iter()
                    .map(OsString::from)
                    .chain(iter::once(lvm))
                    .chain(report)
                    .collect(),
            ),
            None => (lvm, report.collect()),
        }
    }
}
