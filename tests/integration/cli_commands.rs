use anyhow::Result;
use serde_json::Value;

use crate::common::{fixture, stderr, stdout, tgi_launch};

#[tokio::test]
async fn render_tokens_lists_flags_in_order() -> Result<()> {
    let output = tgi_launch([
        "render",
        "--config",
        fixture("tests/fixtures/launch_valid.toml").as_str(),
        "--format",
        "tokens",
    ])
    .output()
    .await?;
    assert!(output.status.success(), "{}", stderr(&output));

    let tokens: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(
        &tokens[..8],
        [
            "--gpus",
            "\"device=0,1\"",
            "--shm-size",
            "1g",
            "--publish",
            "9123:80",
            "--volume",
            "/data/models:/models"
        ]
    );
    assert_eq!(&tokens[tokens.len() - 2..], ["--max-stop-sequences", "12"]);
    Ok(())
}

#[tokio::test]
async fn validate_all_reports_invalid_profiles() -> Result<()> {
    let output = tgi_launch([
        "validate",
        "--all",
        "--config",
        fixture("tests/fixtures/launch_no_default.toml").as_str(),
    ])
    .output()
    .await?;
    assert_eq!(output.status.code(), Some(2));
    let report = stdout(&output);
    assert!(report.contains("invalid  invalid-limits"), "{report}");
    assert!(report.contains("ok       valid"), "{report}");
    Ok(())
}

#[tokio::test]
async fn profiles_json_marks_default() -> Result<()> {
    let output = tgi_launch([
        "profiles",
        "--json",
        "--config",
        fixture("tests/fixtures/launch_valid.toml").as_str(),
    ])
    .output()
    .await?;
    assert!(output.status.success(), "{}", stderr(&output));

    let profiles: Value = serde_json::from_str(&stdout(&output))?;
    let profiles = profiles.as_array().expect("array of profiles");
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[1]["name"], "llama2-7b");
    assert_eq!(profiles[1]["default"], true);
    assert_eq!(profiles[0]["default"], false);
    assert_eq!(profiles[0]["valid"], true);
    Ok(())
}

#[tokio::test]
async fn unknown_profile_exits_2_and_lists_available() -> Result<()> {
    let output = tgi_launch([
        "render",
        "--profile",
        "mistral",
        "--config",
        fixture("tests/fixtures/launch_valid.toml").as_str(),
    ])
    .output()
    .await?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("available: llama2-13b, llama2-7b"));
    Ok(())
}

#[tokio::test]
async fn missing_config_file_exits_2() -> Result<()> {
    let output = tgi_launch([
        "validate",
        "--config",
        fixture("tests/fixtures/does_not_exist.toml").as_str(),
    ])
    .output()
    .await?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn import_prints_profile_table() -> Result<()> {
    let output = tgi_launch([
        "import",
        "--name",
        "bloom",
        "--",
        "docker",
        "run",
        "--gpus",
        "all",
        "-p",
        "8080:80",
        "-v",
        "/data:/data",
        "ghcr.io/huggingface/text-generation-inference:1.4",
        "--model-id",
        "bigscience/bloom-560m",
        "--max-best-of",
        "2",
    ])
    .output()
    .await?;
    assert!(output.status.success(), "{}", stderr(&output));

    let document: toml::Value = toml::from_str(&stdout(&output))?;
    let profile = &document["profiles"]["bloom"];
    assert_eq!(profile["gpus"].as_str(), Some("all"));
    assert_eq!(profile["published_port"].as_integer(), Some(8080));
    assert_eq!(profile["model_id"].as_str(), Some("bigscience/bloom-560m"));
    assert_eq!(
        profile["extra_args"].as_array().map(Vec::len),
        Some(2),
        "{document}"
    );
    Ok(())
}

#[tokio::test]
async fn schema_is_json() -> Result<()> {
    let output = tgi_launch(["schema"]).output().await?;
    assert!(output.status.success(), "{}", stderr(&output));
    let schema: Value = serde_json::from_str(&stdout(&output))?;
    assert!(schema["properties"]["profiles"].is_object());
    Ok(())
}

#[tokio::test]
async fn import_with_uppercase_name_exits_2() -> Result<()> {
    let output = tgi_launch([
        "import",
        "--name",
        "Bloom",
        "--",
        "docker",
        "run",
        "img:1.4",
        "--model-id",
        "bigscience/bloom-560m",
    ])
    .output()
    .await?;
    assert_eq!(output.status.code(), Some(2));
    assert!(
        stderr(&output).contains("invalid profile name `Bloom`"),
        "{}",
        stderr(&output)
    );
    assert!(stdout(&output).is_empty());
    Ok(())
}

#[tokio::test]
async fn profile_argument_matches_any_case() -> Result<()> {
    let output = tgi_launch([
        "render",
        "--profile",
        "LLAMA2-13B",
        "--config",
        fixture("tests/fixtures/launch_valid.toml").as_str(),
        "--format",
        "tokens",
    ])
    .output()
    .await?;
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("/models/llama2-13b"));
    Ok(())
}
