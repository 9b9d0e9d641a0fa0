mod support;

use support::TestRoot;

fn task(root: &TestRoot, project: &str, name: &str, extra: &[&str]) -> String {
    let mut args = vec!["task", "new", project, name];
    args.extend_from_slice(extra);
    root.json("alice", &args)["id"]
        .as_str()
        .expect("task id")
        .to_string()
}

fn goal(root: &TestRoot, project: &str, name: &str) -> String {
    root.json("alice", &["goal", "new", project, name])["id"]
        .as_str()
        .expect("goal id")
        .to_string()
}

#[test]
fn goal_progress_follows_linked_tasks() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Marathon");
    let goal_id = goal(&root, &project, "Finish under four hours");
    let a = task(&root, &project, "Long run", &["--goal", &goal_id]);
    let _b = task(&root, &project, "Intervals", &["--goal", &goal_id]);
    let _c = task(&root, &project, "Tempo", &["--goal", &goal_id]);

    root.json("alice", &["task", "status", &a, "done", "--date", "2024-06-03"]);

    let goals = root.json("alice", &["goal", "list", &project]);
    assert_eq!(goals["total"], 1);
    assert_eq!(goals["goals"][0]["progress"], 33);
    assert_eq!(goals["goals"][0]["linked_tasks"].as_array().expect("array").len(), 3);
}

#[test]
fn cross_project_link_is_a_conflict() {
    let root = TestRoot::initialized();
    let first = root.new_project("alice", "First");
    let second = root.new_project("alice", "Second");
    let goal_id = goal(&root, &first, "Ship");
    let task_id = task(&root, &second, "Elsewhere", &[]);

    let (code, error) = root.json_err("alice", &["task", "link", &task_id, &goal_id]);
    assert_eq!(code, 3);
    assert_eq!(error["kind"], "conflict");
}

#[test]
fn relink_reports_skipped_tasks() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Book");
    let other = root.new_project("alice", "Other");
    let target = goal(&root, &project, "Draft");
    let elsewhere = goal(&root, &project, "Edit");

    let free = task(&root, &project, "Write", &[]);
    let taken = task(&root, &project, "Proofread", &["--goal", &elsewhere]);
    let foreign = task(&root, &other, "Unrelated", &[]);

    let report = root.json(
        "alice",
        &["goal", "relink", &target, &free, &taken, &foreign, "tsk-missing"],
    );
    assert_eq!(report["linked"][0], free.as_str());
    let skipped = report["skipped"].as_array().expect("array");
    assert_eq!(skipped.len(), 3);
    let reasons: Vec<&str> = skipped
        .iter()
        .map(|entry| entry["reason"].as_str().expect("reason"))
        .collect();
    assert!(reasons.contains(&"linked_elsewhere"));
    assert!(reasons.contains(&"other_project"));
    assert!(reasons.contains(&"not_found"));

    let shown = root.json("alice", &["task", "list", "--goal", &elsewhere]);
    assert_eq!(shown["total"], 1);
    assert_eq!(shown["tasks"][0]["id"], taken.as_str());
}

#[test]
fn deleting_a_goal_unlinks_its_tasks() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Book");
    let goal_id = goal(&root, &project, "Draft");
    let task_id = task(&root, &project, "Write", &["--goal", &goal_id]);

    let deletion = root.json("alice", &["goal", "delete", &goal_id]);
    assert_eq!(deletion["unlinked_tasks"][0], task_id.as_str());

    let tasks = root.json("alice", &["task", "list", "--project", &project]);
    assert!(tasks["tasks"][0].get("goal_id").is_none());
}

#[test]
fn reset_reopens_recurring_tasks_on_their_days() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Habits");
    let task_id = task(
        &root,
        &project,
        "Stretch",
        &["--recurring", "--days", "mon,wed,fri"],
    );
    root.json("alice", &["task", "status", &task_id, "done", "--date", "2024-06-03"]);

    // 2024-06-04 is a Tuesday.
    let tuesday = root.json("alice", &["task", "reset", "--date", "2024-06-04"]);
    assert_eq!(tuesday["reset"].as_array().expect("array").len(), 0);

    let wednesday = root.json("alice", &["task", "reset", "--date", "2024-06-05"]);
    assert_eq!(wednesday["reset"][0], task_id.as_str());

    let tasks = root.json("alice", &["task", "list", "--status", "todo"]);
    assert_eq!(tasks["total"], 1);
}

#[test]
fn stats_track_recorded_days() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Daily");
    let task_id = task(&root, &project, "Read", &["--select"]);

    let first = root.json("alice", &["stats", "record", "--date", "2024-06-03"]);
    assert_eq!(first["tasks_selected"], 1);
    assert_eq!(first["fully_completed"], false);

    root.json("alice", &["task", "status", &task_id, "done", "--date", "2024-06-04"]);
    root.json("alice", &["stats", "record", "--date", "2024-06-04"]);
    root.json("alice", &["stats", "record", "--date", "2024-06-05"]);

    let stats = root.json(
        "alice",
        &["stats", "show", "--from", "2024-06-01", "--to", "2024-06-05"],
    );
    assert_eq!(stats["total_days"], 3);
    assert_eq!(stats["fully_completed_days"], 2);
    assert_eq!(stats["completion_rate"], 67);
    assert_eq!(stats["current_streak"], 2);
    assert_eq!(stats["longest_streak"], 2);
    assert_eq!(stats["series"].as_array().expect("array").len(), 3);
}

#[test]
fn oversized_stats_window_is_a_user_error() {
    let root = TestRoot::initialized();

    let (code, error) = root.json_err(
        "alice",
        &["stats", "show", "--days", "4000000000", "--to", "2024-06-05"],
    );
    assert_eq!(code, 2);
    assert_eq!(error["kind"], "validation");

    root.write_config("[stats]\nwindow_days = 4000000000\n");
    let (code, error) = root.json_err("alice", &["stats", "show"]);
    assert_eq!(code, 2);
    assert_eq!(error["kind"], "invalid_config");
}
