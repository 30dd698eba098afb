//! End-to-end tests driving the `oxifuzz` binary: seeded runs, replay,
//! continuous mode and delta debugging.

use std::path::Path;
use std::process::Command;

fn oxifuzz() -> Command {
    Command::new(env!("CARGO_BIN_EXE_oxifuzz"))
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn test_seeded_run_trace_shape() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("run.trace");
    let output = oxifuzz()
        .args(["--bv", "--ints", "-s", "deadbeef", "-t", "2.0", "-a"])
        .arg(&trace)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let content = read(&trace);
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some("set-oxifuzz-options --bv --ints -t 2.0")
    );
    assert_eq!(lines.next(), Some("new-solver"));
    assert_eq!(content.lines().last(), Some("delete-solver"));
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let trace_a = dir.path().join("a.trace");
    let trace_b = dir.path().join("b.trace");
    for trace in [&trace_a, &trace_b] {
        let output = oxifuzz()
            .args(["--bv", "-s", "1f2e3d4c", "-a"])
            .arg(trace)
            .output()
            .unwrap();
        assert!(output.status.success());
    }
    assert_eq!(read(&trace_a), read(&trace_b));
}

#[test]
fn test_replay_reproduces_trace() {
    let dir = tempfile::tempdir().unwrap();
    let recorded = dir.path().join("run.trace");
    let output = oxifuzz()
        .args(["--bv", "--strings", "-s", "cafe", "-a"])
        .arg(&recorded)
        .output()
        .unwrap();
    assert!(output.status.success());

    // The replay reads its configuration from the trace prelude.
    let replayed = dir.path().join("replay.trace");
    let output = oxifuzz()
        .arg("-u")
        .arg(&recorded)
        .arg("-a")
        .arg(&replayed)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(read(&recorded), read(&replayed));
}

#[test]
fn test_replay_of_broken_trace_fails() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("broken.trace");
    std::fs::write(
        &trace,
        "set-oxifuzz-options\nnew-solver\nassert t42\ndelete-solver\n",
    )
    .unwrap();
    let output = oxifuzz().arg("-u").arg(&trace).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("untrace error"), "stderr: {stderr}");
    assert!(stderr.contains("t42"), "stderr: {stderr}");
}

#[test]
fn test_continuous_mode_respects_max_runs() {
    let dir = tempfile::tempdir().unwrap();
    let output = oxifuzz()
        .current_dir(dir.path())
        .args(["--bv", "-m", "3", "--max-actions", "40"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_delta_debugging_minimizes_a_trace() {
    let dir = tempfile::tempdir().unwrap();
    let recorded = dir.path().join("run.trace");
    let output = oxifuzz()
        .args(["--bv", "--max-actions", "15", "-s", "77", "-a"])
        .arg(&recorded)
        .output()
        .unwrap();
    assert!(output.status.success());
    let original_lines = read(&recorded).lines().count();

    let minimized = dir.path().join("min.trace");
    let output = oxifuzz()
        .arg("-u")
        .arg(&recorded)
        .arg("-D")
        .arg(&minimized)
        .args(["-d", "-T"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let content = read(&minimized);
    assert!(content.starts_with("set-oxifuzz-options"));
    assert!(content.lines().count() <= original_lines);
    // Whatever remains must still replay cleanly.
    let output = oxifuzz().arg("-u").arg(&minimized).output().unwrap();
    assert!(output.status.success());
}

#[test]
fn test_check_mode_run() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("run.trace");
    let plain = dir.path().join("plain.trace");
    for (args, path) in [(vec!["--check"], &trace), (vec![], &plain)] {
        let output = oxifuzz()
            .args(args)
            .args(["--bv", "-s", "c4ec", "-a"])
            .arg(path)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    // Checking is invisible to the recorded actions; only the options
    // prelude differs.
    let actions = |path: &std::path::Path| -> Vec<String> {
        read(path).lines().skip(1).map(str::to_string).collect()
    };
    assert_eq!(actions(&trace), actions(&plain));
}

#[test]
fn test_print_fsm() {
    let output = oxifuzz().arg("--print-fsm").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("state new"));
    assert!(stdout.contains("state delete (final)"));
    assert!(stdout.contains("mk-term"));
}

#[test]
fn test_stats_output() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("run.trace");
    let output = oxifuzz()
        .args(["--bv", "-s", "9a", "--stats", "-a"])
        .arg(&trace)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("actions"), "stdout: {stdout}");
}
