use std::time::{Duration, Instant};

use lvmstate::{retrieve, CancelCause, Error, ErrorKind, LvmState, ReportConfig};
use tokio_util::sync::CancellationToken;

const GOOD: &str = r#"
  {
    "report": [
      {
        "vg": [
          {
            "vg_name": "myvg1",
            "vg_uuid": "P8en82-LNUe-MERd-mOTT-XlAS-fkp8-1bleiB",
            "vg_size": "2199014866944",
            "vg_free": "2198482190336"
          }
        ],
        "pv": [
          {},
          {}
        ],
        "lv": [
          {
            "lv_uuid": "n3eoy5-R1B3-9S6A-rBwo-3n9f-mIxA-Dy4nnw",
            "lv_name": "thinpool",
            "lv_full_name": "myvg1/thinpool",
            "lv_path": "",
            "lv_size": "524288000",
            "lv_kernel_major": "253",
            "lv_kernel_minor": "2",
            "origin": "",
            "origin_size": "",
            "pool_lv": "",
            "lv_tags": "some_tag,some_tag2",
            "lv_attr": "twi-a-tz--",
            "vg_name": "myvg1",
            "data_percent": "0.00",
            "metadata_percent": "10.84"
          }
        ],
        "pvseg": [
          {},
          {},
          {},
          {},
          {}
        ],
        "seg": [
          {}
        ]
      }
    ]
  }
"#;

const TRUNCATED: &str = r#"
  {
    "report": [
      {
        "vg": [
          {
            "vg_name": "myvg1",
            "vg_uuid": "P8en82-LNUe-MERd-mOTT-XlAS-fkp8-1bleiB",
            "vg_size": "2199014866944",
            "vg_free": "2198482190336"
          }
        ],
        "pv": [
          {},
          {}
        ],
        "lv": [
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Stands in for lvm: `sh -c <script> lvm <report args...>`.
fn fake_lvm(script: &str) -> ReportConfig {
    ReportConfig {
        lvm_path: "lvm".into(),
        command_prefix: vec!["/bin/sh".into(), "-c".into(), script.into()],
        ..ReportConfig::default()
    }
}

fn printing(report: &str) -> ReportConfig {
    fake_lvm(&format!("printf '%s' '{report}'"))
}

#[test]
fn full_report() {
    init_tracing();
    let state = LvmState::from_reader(GOOD.as_bytes()).unwrap();
    assert_eq!(state.vgs().len(), 1);
    assert_eq!(state.lvs().len(), 1);

    let lv = &state.lvs()[0];
    assert_eq!(lv.uuid(), "n3eoy5-R1B3-9S6A-rBwo-3n9f-mIxA-Dy4nnw");
    assert_eq!(lv.name(), "thinpool");
    assert_eq!(lv.full_name(), "myvg1/thinpool");
    assert_eq!(lv.path(), "");
    assert_eq!(lv.size(), 524288000);
    assert_eq!(lv.major(), 253);
    assert_eq!(lv.minor(), 2);
    assert_eq!(lv.origin(), "");
    assert_eq!(lv.origin_size(), 0);
    assert_eq!(lv.pool_lv(), "");
    assert_eq!(lv.tags(), ["some_tag", "some_tag2"]);
    assert_eq!(lv.attr(), "twi-a-tz--");
    assert_eq!(lv.vg_name(), "myvg1");
    assert_eq!(lv.data_percent(), 0.0);
    assert_eq!(lv.metadata_percent(), 10.84);

    let vg = &state.vgs()[0];
    assert_eq!(vg.name(), "myvg1");
    assert_eq!(vg.uuid(), "P8en82-LNUe-MERd-mOTT-XlAS-fkp8-1bleiB");
    assert_eq!(vg.size(), 2199014866944);
    assert_eq!(vg.free(), 2198482190336);
}

#[test]
fn inactive_device_numbers() {
    init_tracing();
    let inactive = GOOD
        .replace(r#""lv_kernel_major": "253""#, r#""lv_kernel_major": "-1""#)
        .replace(r#""lv_kernel_minor": "2""#, r#""lv_kernel_minor": "-1""#);
    let state = LvmState::from_reader(inactive.as_bytes()).unwrap();
    assert_eq!(state.lvs().len(), 1);
    assert_eq!(state.vgs().len(), 1);
    assert_eq!(state.lvs()[0].major(), 0);
    assert_eq!(state.lvs()[0].minor(), 0);
}

#[test]
fn truncated_report() {
    init_tracing();
    let err = LvmState::from_reader(TRUNCATED.as_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn json_std_report() {
    init_tracing();
    let std_format = r#"{"report": [{
        "vg": [{"vg_name": "vg", "vg_uuid": "u", "vg_size": 2199014866944, "vg_free": 0}],
        "pv": [{}],
        "lv": [{"lv_name": "lv", "lv_full_name": "vg/lv", "vg_name": "vg", "lv_size": 4194304,
                "lv_kernel_major": -1, "lv_kernel_minor": -1, "origin_size": null,
                "lv_tags": "", "data_percent": null, "metadata_percent": null}],
        "pvseg": [],
        "seg": []
    }]}"#;
    let state = LvmState::from_reader(std_format.as_bytes()).unwrap();
    assert_eq!(state.vg("vg").unwrap().size(), 2199014866944);
    let lv = state.lv("vg/lv").unwrap();
    assert_eq!(lv.size(), 4194304);
    assert_eq!((lv.major(), lv.minor()), (0, 0));
    assert!(lv.tags().is_empty());
    assert_eq!(lv.data_percent(), 0.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn retrieves_state() {
    init_tracing();
    let state = retrieve(&printing(GOOD), &CancellationToken::new()).await.unwrap();
    assert_eq!(state.vg("myvg1").unwrap().free(), 2198482190336);
    assert_eq!(state.lv("myvg1/thinpool").unwrap().metadata_percent(), 10.84);
}

#[tokio::test(flavor = "multi_thread")]
async fn passes_report_arguments() {
    init_tracing();
    let script = format!(
        r#"[ "$1" = fullreport ] && [ "$3" = json ] && [ "$LC_ALL" = C ] || exit 9; printf '%s' '{GOOD}'"#
    );
    let state = retrieve(&fake_lvm(&script), &CancellationToken::new()).await.unwrap();
    assert_eq!(state.lvs().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_command() {
    init_tracing();
    let config = fake_lvm("printf '{\"rep'; echo '  Volume group \"nope\" not found' >&2; exit 5");
    let err = retrieve(&config, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    match err {
        Error::Exit { status, stderr, .. } => {
            assert_eq!(status.code(), Some(5));
            assert_eq!(stderr, "Volume group \"nope\" not found");
        }
        e => panic!("unexpected error {e}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_command() {
    init_tracing();
    let config = ReportConfig {
        lvm_path: "/nonexistent/sbin/lvm".into(),
        ..ReportConfig::default()
    };
    let err = retrieve(&config, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[tokio::test(flavor = "multi_thread")]
async fn truncated_output() {
    init_tracing();
    let err = retrieve(&printing(TRUNCATED), &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test(flavor = "multi_thread")]
async fn broken_report_with_long_tail() {
    init_tracing();
    // more than a pipe buffer follows the syntax error
    let config = fake_lvm(r#"printf '{"report": [x'; head -c 4000000 /dev/zero | tr '\0' ' '"#);
    let err = retrieve(&config, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }), "unexpected error {err}");
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_output() {
    init_tracing();
    let bad = GOOD.replace("2199014866944", "2.1T");
    let err = retrieve(&printing(&bad), &CancellationToken::new()).await.unwrap_err();
    match err {
        Error::MalformedField { field, value } => {
            assert_eq!(field, "vg_size");
            assert_eq!(value, "2.1T");
        }
        e => panic!("unexpected error {e}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_kills_lvm() {
    init_tracing();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = retrieve(&fake_lvm("exec sleep 30"), &cancel).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, Error::Cancelled { cause: CancelCause::Requested }));
    assert_eq!(err.kind(), ErrorKind::Cancellation);
}

/// Whether `pid` exists and is not a zombie waiting to be reaped.
fn running(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat.rsplit_once(") ").map_or(false, |(_, rest)| !rest.starts_with('Z')),
        Err(_) => false,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_kills_forked_lvm() {
    init_tracing();
    let pidfile = std::env::temp_dir().join(format!("lvmstate-forked-{}.pid", std::process::id()));
    let _ = std::fs::remove_file(&pidfile);
    // like `nsenter -p`, the prefix forks and lvm runs as a grandchild
    let script = format!("sleep 30 & echo $! > '{}'; wait", pidfile.display());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = retrieve(&fake_lvm(&script), &cancel).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, Error::Cancelled { cause: CancelCause::Requested }));

    let pid: i32 = std::fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while running(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let _ = std::fs::remove_file(&pidfile);
    assert!(!running(pid), "forked lvm {pid} survived cancellation");
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_kills_lvm() {
    init_tracing();
    let config = ReportConfig {
        timeout_secs: Some(1),
        ..fake_lvm("exec sleep 30")
    };
    let started = Instant::now();
    let err = retrieve(&config, &CancellationToken::new()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, Error::Cancelled { cause: CancelCause::TimedOut }));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_before_start() {
    init_tracing();
    let cancel = CancellationToken::new();
    cancel.cancel();
    // never spawned, or this would be a spawn error
    let config = ReportConfig {
        lvm_path: "/nonexistent/sbin/lvm".into(),
        ..ReportConfig::default()
    };
    let err = retrieve(&config, &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancellation);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_afterwards_changes_nothing() {
    init_tracing();
    let cancel = CancellationToken::new();
    let state = retrieve(&printing(GOOD), &cancel).await.unwrap();
    cancel.cancel();
    assert_eq!(state.vgs().len(), 1);
}
