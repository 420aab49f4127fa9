//! End-to-end generation flow: staleness evaluation, subprocess
//! invocation, and fingerprint lifecycle.

use super::test_utils::{fake_toolchain, node, non_forcing_config, source_dir, FixedProbe, SpyInvoker};
use anyhow::Result;
use regen::error::GenerationError;
use regen::graph::MemoryGraph;
use regen::invoker::SubprocessInvoker;
use regen::task::{GenerationTask, Outcome};
use regen::toolchain::Toolchain;
use std::fs;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_regenerates_once_then_skips() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();
    task.prepare(&graph)?;
    let invoker = SpyInvoker::succeeding();

    let outcome = task.ensure_generated(&graph, None, &invoker)?;
    assert_eq!(outcome, Outcome::Regenerated);
    assert_eq!(invoker.call_count(), 1);

    // Identical arguments: the subprocess must not run again.
    let outcome = task.ensure_generated(&graph, None, &invoker)?;
    assert_eq!(outcome, Outcome::UpToDate);
    assert_eq!(invoker.call_count(), 1);
    Ok(())
}

#[test]
fn test_fingerprint_records_invocation_args() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();
    let invoker = SpyInvoker::succeeding();

    task.ensure_generated(&graph, None, &invoker)?;

    let invocation = invoker.last_invocation().unwrap();
    assert_eq!(invocation.workdir, srcdir);
    assert_eq!(
        task.fingerprint().recorded_args().unwrap(),
        invocation.args
    );
    let raw = fs::read_to_string(task.fingerprint().path())?;
    assert_eq!(raw, invocation.args.join("\n"));
    Ok(())
}

#[test]
fn test_up_to_date_marks_stamp_current() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();
    task.prepare(&graph)?;
    let invoker = SpyInvoker::succeeding();

    task.ensure_generated(&graph, None, &invoker)?;
    let first_mtime = task.fingerprint().mtime().unwrap();

    sleep(Duration::from_millis(20));
    let outcome = task.ensure_generated(&graph, None, &invoker)?;
    assert_eq!(outcome, Outcome::UpToDate);

    // Touched, not rewritten: mtime advances, content stays.
    assert!(task.fingerprint().mtime().unwrap() > first_mtime);
    assert_eq!(invoker.call_count(), 1);
    Ok(())
}

#[test]
fn test_changed_options_regenerate() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let srcdir = source_dir(&temp, "app");
    let graph = MemoryGraph::new();
    let invoker = SpyInvoker::succeeding();

    let config = non_forcing_config();
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    task.ensure_generated(&graph, None, &invoker)?;

    let mut changed = non_forcing_config();
    changed.corba = true;
    let task = GenerationTask::new(node("app", &srcdir), &changed, &toolchain);
    let outcome = task.ensure_generated(&graph, None, &invoker)?;
    assert_eq!(outcome, Outcome::Regenerated);
    assert_eq!(invoker.call_count(), 2);
    Ok(())
}

#[test]
fn test_force_policy_always_regenerates() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let mut config = non_forcing_config();
    config.always_regenerate = true;
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();
    let invoker = SpyInvoker::succeeding();

    assert_eq!(
        task.ensure_generated(&graph, None, &invoker)?,
        Outcome::Regenerated
    );
    assert_eq!(
        task.ensure_generated(&graph, None, &invoker)?,
        Outcome::Regenerated
    );
    assert_eq!(invoker.call_count(), 2);
    Ok(())
}

#[test]
fn test_failure_leaves_fingerprint_untouched() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let srcdir = source_dir(&temp, "app");
    let graph = MemoryGraph::new();

    let config = non_forcing_config();
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    task.ensure_generated(&graph, None, &SpyInvoker::succeeding())?;
    let recorded = task.fingerprint().recorded_args().unwrap();

    // New options make the node stale; the generator then fails.
    let mut changed = non_forcing_config();
    changed.corba = true;
    let task = GenerationTask::new(node("app", &srcdir), &changed, &toolchain);
    let failing = SpyInvoker::failing(1);
    let err = task.ensure_generated(&graph, None, &failing).unwrap_err();
    match err {
        GenerationError::GenerationFailed {
            node,
            command,
            status,
            output,
        } => {
            assert_eq!(node, "app");
            assert_eq!(status, 1);
            assert!(command.contains("app.gen"));
            assert!(output.contains("simulated generator failure"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Old fingerprint survives, so the next attempt is still stale.
    assert_eq!(task.fingerprint().recorded_args().unwrap(), recorded);
    let retry = SpyInvoker::failing(1);
    assert!(task.ensure_generated(&graph, None, &retry).is_err());
    assert_eq!(retry.call_count(), 1);
    Ok(())
}

#[test]
fn test_outdated_downstream_output_regenerates() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();
    let invoker = SpyInvoker::succeeding();

    task.ensure_generated(&graph, Some(&FixedProbe(true)), &invoker)?;
    assert_eq!(invoker.call_count(), 1);

    // The compiled-build step says its output drifted.
    let outcome = task.ensure_generated(&graph, Some(&FixedProbe(false)), &invoker)?;
    assert_eq!(outcome, Outcome::Regenerated);
    assert_eq!(invoker.call_count(), 2);
    Ok(())
}

#[test]
fn test_tool_update_regenerates() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();
    let invoker = SpyInvoker::succeeding();

    task.ensure_generated(&graph, None, &invoker)?;

    sleep(Duration::from_millis(20));
    fs::write(
        temp.path().join("toolchain").join("bin").join("generator"),
        "#!/usr/bin/env ruby\n# updated\n",
    )?;

    let outcome = task.ensure_generated(&graph, None, &invoker)?;
    assert_eq!(outcome, Outcome::Regenerated);
    assert_eq!(invoker.call_count(), 2);
    Ok(())
}

#[test]
fn test_forced_build_preparation_drops_fingerprint() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();
    let invoker = SpyInvoker::succeeding();

    task.ensure_generated(&graph, None, &invoker)?;
    task.prepare_for_forced_build()?;
    assert!(!task.fingerprint().exists());

    let outcome = task.ensure_generated(&graph, None, &invoker)?;
    assert_eq!(outcome, Outcome::Regenerated);
    assert_eq!(invoker.call_count(), 2);
    Ok(())
}

#[test]
fn test_missing_interpreter_surfaces_tool_not_found() -> Result<()> {
    let temp = TempDir::new()?;
    let root = temp.path().join("toolchain");
    fs::create_dir_all(root.join("bin"))?;
    let tool = root.join("bin").join("generator");
    fs::write(&tool, "")?;
    let toolchain = Toolchain::new(
        PathBuf::from("regen-test-no-such-interpreter"),
        tool,
        Some(root),
    )?;
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);
    let graph = MemoryGraph::new();

    let err = task
        .ensure_generated(&graph, None, &SubprocessInvoker)
        .unwrap_err();
    assert!(matches!(err, GenerationError::ToolNotFound { .. }));
    Ok(())
}
