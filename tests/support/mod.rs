#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A temporary focus root driven through the binary.
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// A root that has already been through `focus init`.
    pub fn initialized() -> Self {
        let root = Self::new();
        root.focus(None).arg("init").assert().success();
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join(".focus")
    }

    pub fn write_config(&self, contents: &str) {
        std::fs::write(self.dir.path().join("focus.toml"), contents).expect("write focus.toml");
    }

    /// `focus` with this root and, optionally, an acting user.
    pub fn focus(&self, user: Option<&str>) -> Command {
        let mut cmd = Command::cargo_bin("focus").expect("binary");
        cmd.env("FOCUS_ROOT", self.dir.path())
            .env_remove("FOCUS_USER")
            .env_remove("RUST_LOG");
        if let Some(user) = user {
            cmd.env("FOCUS_USER", user);
        }
        cmd
    }

    /// Run a command with `--json` as `user` and return the `data` payload.
    pub fn json(&self, user: &str, args: &[&str]) -> Value {
        let output = self
            .focus(Some(user))
            .arg("--json")
            .args(args)
            .output()
            .expect("run focus");
        assert!(
            output.status.success(),
            "focus {:?} failed: {}{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["schema_version"], "focus.v1");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    /// Run a command with `--json` expecting failure; returns (exit code, error body).
    pub fn json_err(&self, user: &str, args: &[&str]) -> (i32, Value) {
        let output = self
            .focus(Some(user))
            .arg("--json")
            .args(args)
            .output()
            .expect("run focus");
        assert!(!output.status.success(), "focus {:?} unexpectedly succeeded", args);
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "error");
        (output.status.code().unwrap_or(-1), envelope["error"].clone())
    }

    pub fn new_project(&self, owner: &str, name: &str) -> String {
        self.json(owner, &["project", "new", name])["id"]
            .as_str()
            .expect("project id")
            .to_string()
    }
}
