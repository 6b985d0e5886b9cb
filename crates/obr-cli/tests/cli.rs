//! End-to-end tests driving the `obr` binary against a repository on disk.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const REPOSITORY: &str = r#"{
    "name": "Test",
    "lastModified": 1700000000000,
    "resources": [
        {
            "symbolicName": "org.acme.api",
            "presentationName": "Acme API",
            "version": "1.0.0",
            "uri": "jars/api.jar",
            "categories": ["core"],
            "capabilities": [
                { "name": "package", "properties": [
                    { "n": "package", "v": "org.acme.api" },
                    { "n": "version", "t": "version", "v": "1.0.0" }
                ] }
            ]
        },
        {
            "symbolicName": "org.acme.impl",
            "version": "1.0.0",
            "uri": "jars/impl.jar",
            "capabilities": [
                { "name": "package", "properties": [ { "n": "package", "v": "org.acme.impl" } ] }
            ],
            "requirements": [
                { "name": "package", "filter": "(package=org.acme.api)" }
            ]
        },
        {
            "symbolicName": "org.acme.broken",
            "version": "1.0.0",
            "uri": "jars/broken.jar",
            "requirements": [
                { "name": "package", "filter": "(package=org.missing)" }
            ]
        }
    ]
}"#;

/// A temporary home with a config file and one repository.
struct TestContext {
    temp_dir: TempDir,
    config: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();

        std::fs::create_dir_all(root.join("repo/jars")).expect("failed to create repo dir");
        std::fs::write(root.join("repo/repository.json"), REPOSITORY)
            .expect("failed to write repository");
        for jar in ["api", "impl", "broken"] {
            std::fs::write(root.join(format!("repo/jars/{jar}.jar")), b"PK")
                .expect("failed to write jar");
        }

        let config = root.join("obr.toml");
        std::fs::write(
            &config,
            "repositories = [\"repo\"]\ndeploy-dir = \"deploy\"\n",
        )
        .expect("failed to write config");

        Self { temp_dir, config }
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn obr(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_obr"))
            .env("HOME", self.root())
            .env_remove("OBR_CONFIG")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run obr")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    assert!(ctx.obr(&["--version"]).status.success());
}

#[test]
fn test_repos_lists_configured_repository() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["repos"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Test"));
    assert!(out.contains("remote"));
}

#[test]
fn test_list_filters_by_query() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["list", "core"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("org.acme.api"));
    assert!(!out.contains("org.acme.impl"));
}

#[test]
fn test_info_shows_requirements() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["info", "org.acme.impl"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("(package=org.acme.api)"));

    assert!(!ctx.obr(&["info", "org.acme.nope"]).status.success());
}

#[test]
fn test_resolve_prints_required_resources() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["resolve", "org.acme.impl"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Target resource(s):"));
    assert!(out.contains("Required resource(s):"));
    assert!(out.contains("Acme API (1.0.0)"));
}

#[test]
fn test_resolve_accepts_bare_requirements() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["resolve", "--require", "package:(package=org.acme.api)"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Acme API (1.0.0)"));
}

#[test]
fn test_unresolvable_exits_non_zero() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["resolve", "org.acme.broken"]);
    assert!(!output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Unsatisfied requirement(s):"));
    assert!(out.contains("org.missing"));
}

#[test]
fn test_deploy_copies_bundles_and_writes_manifest() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["deploy", "org.acme.impl", "--start"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let deploy = ctx.root().join("deploy");
    assert!(deploy.join("org.acme.api-1.0.0.jar").exists());
    assert!(deploy.join("org.acme.impl-1.0.0.jar").exists());

    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(deploy.join("deployment.json")).unwrap(),
    )
    .unwrap();
    let bundles = manifest["bundles"].as_array().unwrap();
    assert_eq!(bundles.len(), 2);
    // Dependencies first.
    assert_eq!(bundles[0]["symbolic_name"], "org.acme.api");
    assert!(bundles.iter().all(|b| b["started"] == true));
}

#[test]
fn test_deploy_dry_run_touches_nothing() {
    let ctx = TestContext::new();
    let output = ctx.obr(&["deploy", "org.acme.impl", "--dry-run"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("install Acme API (1.0.0)"));
    assert!(out.contains("install org.acme.impl (1.0.0)"));
    assert!(!ctx.root().join("deploy").exists());
}
