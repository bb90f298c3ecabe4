//! Snapshots of the host's LVM topology.
//!
//! [`retrieve`] runs `lvm fullreport` in its JSON mode, [`report::decode`]
//! turns the output into a tree of raw report items and [`extract::extract`]
//! converts those into [`VolumeGroup`]s and [`LogicalVolume`]s. Nothing here
//! changes any storage state, and nothing is kept between calls.

use core::fmt;
use std::process::ExitStatus;

use snafu::Snafu;

pub mod command;
pub mod extract;
mod lv;
pub mod report;
mod retrieve;
mod state;
mod vg;

pub use command::{ReportConfig, ReportFormat};
pub use lv::LogicalVolume;
pub use retrieve::retrieve;
pub use state::LvmState;
pub use vg::VolumeGroup;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("could not decode lvm report"))]
    Decode { source: serde_json::Error },
    #[snafu(display("report field {field} has malformed value {value:?}"))]
    MalformedField { field: &'static str, value: String },
    /// The command is missing or not executable.
    #[snafu(display("could not execute {program}"))]
    Spawn { program: String, source: std::io::Error },
    /// The exit status of the command could not be collected.
    #[snafu(display("could not wait for {program}"))]
    Wait { program: String, source: std::io::Error },
    /// The command exited unsuccessfully; `stderr` is what it printed there.
    #[snafu(display("{program} failed with {status}: {stderr}"))]
    Exit { program: String, status: ExitStatus, stderr: String },
    /// The call was cancelled or timed out and the command was killed.
    #[snafu(display("lvm report {cause}"))]
    Cancelled { cause: CancelCause },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelCause {
    Requested,
    TimedOut,
    /// The runtime went away while the report was being decoded.
    Shutdown,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Requested => f.write_str("was cancelled"),
            CancelCause::TimedOut => f.write_str("timed out"),
            CancelCause::Shutdown => f.write_str("was abandoned during runtime shutdown"),
        }
    }
}

/// Coarse classification of [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The report is not well-formed or could not be read.
    Decode,
    /// A report field does not parse as its type.
    MalformedField,
    /// lvm could not be run or exited unsuccessfully.
    Execution,
    Cancellation,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Decode { .. } => ErrorKind::Decode,
            Error::MalformedField { .. } => ErrorKind::MalformedField,
            Error::Spawn { .. } | Error::Wait { .. } | Error::Exit { .. } => ErrorKind::Execution,
            Error::Cancelled { .. } => ErrorKind::Cancellation,
        }
    }
}
