use std::io;
use std::panic;
use std::process::Stdio;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use snafu::ResultExt;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;

use crate::command::ReportConfig;
use crate::{
    extract, report, CancelCause, CancelledSnafu, ExitSnafu, LvmState, Result, SpawnSnafu,
    WaitSnafu,
};

/// Runs the lvm report and returns what it saw.
///
/// Blocks the calling task until lvm exits. When `cancel` fires or the
/// configured timeout passes first, [`crate::Error::Cancelled`] is returned
/// after the whole process group is killed. lvm runs in a group of its own, so
/// this also reaches processes forked by a command prefix (`nsenter -p` forks).
/// Those may hold the stdout and stderr pipes open; once they are gone the
/// readers of both pipes see end of file and finish. Nothing is retried; a
/// failed call never yields partial results.
pub async fn retrieve(config: &ReportConfig, cancel: &CancellationToken) -> Result<LvmState> {
    if cancel.is_cancelled() {
        return CancelledSnafu { cause: CancelCause::Requested }.fail();
    }

    let (program, args) = config.program_and_args();
    let program_name = program.to_string_lossy().into_owned();
    tracing::debug!(program = %program_name, ?args, "running lvm report");

    let mut command = Command::new(&program);
    command
        .args(&args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    let child = command.spawn().context(SpawnSnafu { program: &program_name })?;
    let group = child.id().and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw);

    let expired = async {
        match config.timeout() {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };

    // dropping `observe` drops the child, which kills it but not its children
    tokio::select! {
        biased;
        result = observe(child, program_name) => result,
        _ = cancel.cancelled() => {
            tracing::debug!("lvm report cancelled");
            kill_group(group);
            CancelledSnafu { cause: CancelCause::Requested }.fail()
        }
        _ = expired => {
            tracing::warn!(timeout = ?config.timeout(), "lvm report timed out");
            kill_group(group);
            CancelledSnafu { cause: CancelCause::TimedOut }.fail()
        }
    }
}

fn kill_group(group: Option<Pid>) {
    let Some(group) = group else { return };
    match killpg(group, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(error) => tracing::warn!(%group, %error, "could not kill lvm process group"),
    }
}

fn not_captured(stream: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, format!("{stream} was not captured"))
}

async fn observe(mut child: Child, program: String) -> Result<LvmState> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| not_captured("stdout"))
        .context(SpawnSnafu { program: &program })?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| not_captured("stderr"))
        .context(SpawnSnafu { program: &program })?;

    // serde_json reads synchronously, so stdout is bridged onto the blocking pool
    let stdout = SyncIoBridge::new(stdout);
    let decoding = tokio::task::spawn_blocking(move || {
        let mut stdout = stdout;
        let decoded = report::decode(&mut stdout);
        // keep reading so lvm finishes normally instead of dying on a closed pipe
        if decoded.is_err() {
            if let Err(error) = io::copy(&mut stdout, &mut io::sink()) {
                tracing::debug!(%error, "could not drain lvm stdout");
            }
        }
        decoded
    });

    let mut diagnostics = Vec::new();
    let (status, drained, decoded) = tokio::join!(child.wait(), stderr.read_to_end(&mut diagnostics), decoding);
    let status = status.context(WaitSnafu { program: &program })?;
    if let Err(error) = drained {
        tracing::debug!(%error, "could not read lvm stderr");
    }
    let stderr = String::from_utf8_lossy(&diagnostics).trim().to_owned();

    // a failing lvm usually leaves a broken report behind, its exit status says more
    if !status.success() {
        tracing::warn!(%status, %stderr, "lvm report failed");
        return ExitSnafu { program, status, stderr }.fail();
    }
    if !stderr.is_empty() {
        tracing::debug!(%stderr, "lvm report diagnostics");
    }

    let report = match decoded {
        Ok(report) => report?,
        Err(join) if join.is_panic() => panic::resume_unwind(join.into_panic()),
        Err(_) => return CancelledSnafu { cause: CancelCause::Shutdown }.fail(),
    };
    let (vgs, lvs) = extract::extract(&report)?;
    tracing::debug!(vgs = vgs.len(), lvs = lvs.len(), "lvm state retrieved");
    Ok(LvmState::new(vgs, lvs))
}
