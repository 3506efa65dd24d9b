use anyhow::Result;
use serde_json::Value;

use crate::common::{stderr, stdout, Workspace, LLAMA2_PROFILES};

#[tokio::test]
async fn launch_hands_rendered_command_to_runtime() -> Result<()> {
    let workspace = Workspace::with_profiles(LLAMA2_PROFILES)?;
    let output = workspace.command(["launch"]).output().await?;
    assert!(
        output.status.success(),
        "launch should succeed: {}",
        stderr(&output)
    );

    let recorded = workspace
        .recorded_args()?
        .expect("runtime should have been invoked");
    let expected: Vec<String> = [
        "run",
        "--gpus",
        "\"device=0,1\"",
        "--shm-size",
        "1g",
        "--publish",
        "9123:80",
        "img:1.4",
        "--model-id",
        "/models/llama2-7b",
        "--num-shard",
        "2",
        "--rope-scaling",
        "dynamic",
        "--rope-factor",
        "8",
        "--max-input-length",
        "31000",
        "--max-total-tokens",
        "32768",
        "--max-batch-prefill-tokens",
        "31000",
        "--max-stop-sequences",
        "12",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();
    assert_eq!(recorded, expected);
    Ok(())
}

#[tokio::test]
async fn runtime_exit_code_is_propagated() -> Result<()> {
    let workspace = Workspace::with_profiles(LLAMA2_PROFILES)?;
    let output = workspace
        .command(["launch"])
        .env("FAKE_RUNTIME_EXIT", "125")
        .output()
        .await?;
    assert_eq!(output.status.code(), Some(125));
    assert!(stderr(&output).contains("exited with status 125"));
    Ok(())
}

#[tokio::test]
async fn validation_failure_exits_before_runtime_starts() -> Result<()> {
    let workspace = Workspace::with_profiles(LLAMA2_PROFILES)?;
    let output = workspace
        .command(["launch", "--profile", "too-long"])
        .output()
        .await?;
    assert_eq!(output.status.code(), Some(2));
    assert!(
        stderr(&output).contains("max_input_length"),
        "stderr: {}",
        stderr(&output)
    );
    assert_eq!(workspace.recorded_args()?, None);
    Ok(())
}

#[tokio::test]
async fn missing_runtime_program_exits_127() -> Result<()> {
    let workspace = Workspace::with_profiles(LLAMA2_PROFILES)?;
    let output = workspace
        .command(["launch", "--runtime", "/nonexistent/tgi-launch-runtime"])
        .output()
        .await?;
    assert_eq!(output.status.code(), Some(127));
    Ok(())
}

#[tokio::test]
async fn dry_run_prints_command_without_running() -> Result<()> {
    let workspace = Workspace::with_profiles(LLAMA2_PROFILES)?;
    let output = workspace
        .command(["launch", "--dry-run", "--runtime", "docker"])
        .output()
        .await?;
    assert!(output.status.success(), "{}", stderr(&output));
    let line = stdout(&output);
    assert!(
        line.starts_with("docker run --gpus '\"device=0,1\"' --shm-size 1g --publish 9123:80 img:1.4"),
        "unexpected dry run output: {line}"
    );
    assert_eq!(workspace.recorded_args()?, None);
    Ok(())
}

#[tokio::test]
async fn json_report_describes_launch() -> Result<()> {
    let workspace = Workspace::with_profiles(LLAMA2_PROFILES)?;
    let output = workspace.command(["launch", "--json"]).output().await?;
    assert!(output.status.success(), "{}", stderr(&output));

    let report: Value = serde_json::from_str(&stdout(&output))?;
    assert_eq!(report["profile"], "llama2-7b");
    assert_eq!(report["image"], "img:1.4");
    assert_eq!(report["exit_code"], 0);
    assert_eq!(report["fingerprint"].as_str().map(str::len), Some(64));
    Ok(())
}

#[tokio::test]
async fn environment_selects_profile_and_overrides_fields() -> Result<()> {
    let workspace = Workspace::with_profiles(LLAMA2_PROFILES)?;
    let output = workspace
        .command(["launch"])
        .env("TGI_LAUNCH_PROFILE", "too-long")
        .env("TGI_LAUNCH_SET_MAX_INPUT_LENGTH", "1000")
        .env("TGI_LAUNCH_SET_NUM_SHARD", "1")
        .output()
        .await?;
    assert!(output.status.success(), "{}", stderr(&output));

    let recorded = workspace.recorded_args()?.expect("runtime should run");
    let position = |flag: &str| recorded.iter().position(|arg| arg == flag);
    let shard_at = position("--num-shard").expect("num shard flag");
    assert_eq!(recorded[shard_at + 1], "1");
    let input_at = position("--max-input-length").expect("input flag");
    assert_eq!(recorded[input_at + 1], "1000");
    let port_at = position("--publish").expect("publish flag");
    assert_eq!(recorded[port_at + 1], "9124:80");
    Ok(())
}
