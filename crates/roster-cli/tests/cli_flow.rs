//! End-to-end tests driving the built `roster` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn roster_binary() -> String {
    env!("CARGO_BIN_EXE_roster").to_string()
}

struct Env {
    temp: TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("data/roster.db");
        let config = temp.path().join("config.toml");
        std::fs::write(
            &config,
            format!("database_path = \"{}\"\n", db_path.display()),
        )
        .unwrap();
        Self { temp, config }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(roster_binary())
            .env("HOME", self.temp.path())
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run roster")
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "roster {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn set_show_and_available_flow() {
    let env = Env::new();

    env.run_ok(&[
        "set",
        "--member",
        "12",
        "--start",
        "2025-03-01T00:00:00Z",
        "--end",
        "2025-03-02T00:00:00Z",
        "--storm",
        "AVAILABLE",
    ]);
    env.run_ok(&[
        "set",
        "--member",
        "12",
        "--start",
        "2025-03-01T10:00:00Z",
        "--end",
        "2025-03-01T12:00:00Z",
        "--storm",
        "UNAVAILABLE",
    ]);

    let shown = env.run_ok(&[
        "show",
        "--member",
        "12",
        "--start",
        "2025-03-01T00:00:00Z",
        "--end",
        "2025-03-02T00:00:00Z",
        "--json",
    ]);
    let rows: serde_json::Value = serde_json::from_str(&shown).unwrap();
    let storms: Vec<&str> = rows[0]["availabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["storm"].as_str().unwrap())
        .collect();
    assert_eq!(storms, vec!["AVAILABLE", "UNAVAILABLE", "AVAILABLE"]);

    let during_gap = env.run_ok(&["available", "--at", "2025-03-01T11:00:00Z"]);
    assert!(during_gap.contains("No members available."));
    let after_gap = env.run_ok(&["available", "--at", "2025-03-01T12:00:00Z"]);
    assert!(after_gap.contains("12  (not in directory)"));
}

#[test]
fn overlapping_replace_is_rejected() {
    let env = Env::new();
    let file = env.write(
        "replace.json",
        r#"{
            "member": 3,
            "start": "2025-03-01T00:00:00Z",
            "end": "2025-03-02T00:00:00Z",
            "availabilities": [
                {"range": {"start": "2025-03-01T01:00:00Z", "end": "2025-03-01T05:00:00Z"}, "storm": "AVAILABLE"},
                {"range": {"start": "2025-03-01T04:00:00Z", "end": "2025-03-01T06:00:00Z"}, "storm": "AVAILABLE"}
            ]
        }"#,
    );

    let output = env.run(&["replace", path_arg(&file)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("conflicting intervals"));

    let status = env.run_ok(&["status"]);
    assert!(status.contains("Intervals: 0 (0 members)"));
}

#[test]
fn template_and_stats_flow() {
    let env = Env::new();
    let members = env.write(
        "members.json",
        r#"[{"number": 4, "full_name": "Ada", "qualifications": ["VR-ACC"],
             "units": [{"unit": "WOL", "team": "Alpha"}]}]"#,
    );
    let template = env.write(
        "template.json",
        r#"{
            "member": 4,
            "origin": "2025-03-03T00:00:00Z",
            "availabilities": [
                {"range": {"start": "2025-03-03T08:00:00Z", "end": "2025-03-03T16:00:00Z"},
                 "storm": "AVAILABLE", "rescue": "IMMEDIATE"}
            ]
        }"#,
    );

    env.run_ok(&["members", "import", path_arg(&members)]);
    env.run_ok(&["template", "set", path_arg(&template)]);
    let applied = env.run_ok(&[
        "template",
        "apply",
        "--member",
        "4",
        "--start",
        "2025-03-10T00:00:00Z",
    ]);
    assert!(applied.contains("2025-03-10T00:00:00Z .. 2025-03-17T00:00:00Z"));

    let stats = env.run_ok(&[
        "stats",
        "--start",
        "2025-03-10T00:00:00Z",
        "--end",
        "2025-03-11T00:00:00Z",
        "--unit",
        "WOL",
        "--json",
    ]);
    let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
    let buckets = stats["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 3);
    assert_eq!(buckets[1]["storm"], 1);
    assert_eq!(buckets[1]["vertical_rescue"]["immediate"], 1);
    assert_eq!(stats["members"][0]["storm_available_secs"], 8 * 3600);
    assert_eq!(stats["teams"][0]["entered_storm"], 1);

    let missing = env.run_ok(&[
        "template",
        "apply",
        "--member",
        "5",
        "--start",
        "2025-03-10T00:00:00Z",
    ]);
    assert_eq!(missing, "No template for 5\n");
}
