extern crate pirl;
extern crate serde_json;
extern crate tempfile;

mod common;

use common::*;
use pirl::experiments::ExperimentResult;
use std::process::Command;

fn pirl() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pirl"));
    cmd.env("RUST_LOG", "pirl=warn");
    cmd
}

#[test]
fn writes_one_result_directory_per_experiment() {
    let data = tempfile::tempdir().unwrap();
    let config = data.path().join("registry.json");
    std::fs::write(
        &config,
        serde_json::to_string(&quick_registry(&["max_ent_single"])).unwrap(),
    )
    .unwrap();

    let status = pirl()
        .arg("--data-dir")
        .arg(data.path())
        .arg("--config")
        .arg(&config)
        .args(["--seed", "3", "--num-workers", "2", "smoke"])
        .status()
        .unwrap();
    assert!(status.success());

    let runs: Vec<_> = std::fs::read_dir(data.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_dir())
        .collect();
    assert_eq!(runs.len(), 1);
    let dir_name = runs[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(dir_name.starts_with("smoke-"), "{dir_name}");
    assert!(dir_name.ends_with(env!("CARGO_PKG_VERSION")), "{dir_name}");

    let json = std::fs::read_to_string(runs[0].join("results.json")).unwrap();
    let result: ExperimentResult = serde_json::from_str(&json).unwrap();
    assert_eq!(result.seed, 3);
    assert_eq!(result.sweeps.len(), 2);
}

#[test]
fn unknown_experiment_fails_before_writing() {
    let data = tempfile::tempdir().unwrap();
    let out = data.path().join("out");

    let status = pirl()
        .arg("--data-dir")
        .arg(&out)
        .arg("no-such-experiment")
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!out.exists());
}
