mod support;

use predicates::str::contains;

use support::TestRoot;

#[test]
fn init_writes_default_config() {
    let root = TestRoot::new();
    let data = root.json("alice", &["init"]);
    assert_eq!(data["created"]["config"], true);
    assert_eq!(data["created"]["store"], true);
    assert_eq!(data["user"], "alice");

    let written = std::fs::read_to_string(root.path().join("focus.toml")).expect("config");
    assert!(written.contains("[storage]"));
    assert!(root.data_dir().join("store.json").exists());

    let again = root.json("alice", &["init"]);
    assert_eq!(again["created"]["config"], false);
    assert_eq!(again["created"]["store"], false);
}

#[test]
fn custom_data_dir_is_used() {
    let root = TestRoot::new();
    root.write_config("[storage]\ndir = \"state\"\n");
    root.focus(None).arg("init").assert().success();
    assert!(root.path().join("state").join("store.json").exists());
}

#[test]
fn invalid_config_is_a_user_error() {
    let root = TestRoot::new();
    root.write_config("[stats]\nwindow_days = 0\n");
    root.focus(Some("alice"))
        .args(["project", "list"])
        .assert()
        .code(2)
        .stderr(contains("stats.window_days"));
}

#[test]
fn whoami_reports_user_source() {
    let root = TestRoot::initialized();
    let data = root.json("alice", &["whoami"]);
    assert_eq!(data["user"], "alice");
    assert_eq!(data["source"], "env");

    root.focus(None)
        .args(["--user", "bob", "init"])
        .assert()
        .success();
    let output = root
        .focus(None)
        .args(["--json", "whoami"])
        .output()
        .expect("whoami");
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["data"]["user"], "bob");
    assert_eq!(envelope["data"]["source"], "persisted");
}
