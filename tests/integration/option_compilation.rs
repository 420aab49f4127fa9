//! Option compilation through the full task stack: policy toggles,
//! version gating, and raw override precedence.

use super::test_utils::{fake_toolchain, node, non_forcing_config, source_dir};
use anyhow::Result;
use regen::config::{NodeSettings, TypeExportPolicy};
use regen::task::GenerationTask;
use tempfile::TempDir;

#[test]
fn test_version_gate_omits_flags_for_old_tool() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("0.9"));
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);

    let args = task.candidate_args()?.unwrap();
    assert!(!args.iter().any(|a| a.starts_with("--parallel-build")));
    assert!(!args.iter().any(|a| a.starts_with("--transports")));
    assert!(!args.iter().any(|a| a.starts_with("--type-export-policy")));
    Ok(())
}

#[test]
fn test_version_gate_emits_flags_for_current_tool() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let mut config = non_forcing_config();
    config.parallel_build_level = 4;
    config.type_export_policy = TypeExportPolicy::All;
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);

    let args = task.candidate_args()?.unwrap();
    assert!(args.contains(&"--parallel-build=4".to_string()));
    assert!(args.contains(&"--transports=corba,mqueue,typelib".to_string()));
    assert!(args.contains(&"--type-export-policy=all".to_string()));
    Ok(())
}

#[test]
fn test_transports_sorted_and_deduplicated() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let mut config = non_forcing_config();
    config.transports = vec![
        "typelib".to_string(),
        "corba".to_string(),
        "typelib".to_string(),
    ];
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);

    let args = task.candidate_args()?.unwrap();
    assert!(args.contains(&"--transports=corba,typelib".to_string()));
    Ok(())
}

#[test]
fn test_unresolved_version_omits_gated_flags() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, None);
    let config = non_forcing_config();
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);

    let args = task.candidate_args()?.unwrap();
    assert_eq!(args, vec!["app.gen".to_string()]);
    Ok(())
}

#[test]
fn test_raw_override_beats_policy_negative() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, None);
    let mut config = non_forcing_config();
    config.extended_states = Some(false);
    config.generator_options = vec!["--extended-states".to_string()];
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);

    let args = task.candidate_args()?.unwrap();
    assert!(args.contains(&"--extended-states".to_string()));
    assert!(!args.contains(&"--no-extended-states".to_string()));
    Ok(())
}

#[test]
fn test_node_raw_overrides_global_raw() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, None);
    let mut config = non_forcing_config();
    config.generator_options = vec!["--import=base".to_string()];
    let srcdir = source_dir(&temp, "app");
    let node = node("app", &srcdir).with_settings(NodeSettings {
        generator_options: vec!["--import=extra".to_string()],
        ..NodeSettings::default()
    });
    let task = GenerationTask::new(node, &config, &toolchain);

    let args = task.candidate_args()?.unwrap();
    assert!(args.contains(&"--import=extra".to_string()));
    assert!(!args.contains(&"--import=base".to_string()));
    Ok(())
}

#[test]
fn test_arguments_sorted_with_spec_file_last() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let mut config = non_forcing_config();
    config.corba = true;
    config.generator_options = vec!["zz-custom".to_string()];
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);

    let args = task.candidate_args()?.unwrap();
    let (spec, flags) = args.split_last().unwrap();
    assert_eq!(spec, "app.gen");
    let mut sorted = flags.to_vec();
    sorted.sort();
    assert_eq!(flags, sorted.as_slice());
    // "zz-custom" sorts after "app.gen"; only the positional stays last.
    assert!(flags.contains(&"zz-custom".to_string()));
    Ok(())
}

#[test]
fn test_same_inputs_compile_identically() -> Result<()> {
    let temp = TempDir::new()?;
    let toolchain = fake_toolchain(&temp, Some("1.1"));
    let mut config = non_forcing_config();
    config.corba = true;
    config.generator_options = vec!["--import=base".to_string(), "--verbose".to_string()];
    let srcdir = source_dir(&temp, "app");
    let task = GenerationTask::new(node("app", &srcdir), &config, &toolchain);

    assert_eq!(task.candidate_args()?, task.candidate_args()?);
    Ok(())
}
