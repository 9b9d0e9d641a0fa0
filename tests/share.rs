mod support;

use support::TestRoot;

fn invite(root: &TestRoot, project: &str, email: &str, role: &str) -> String {
    root.json(
        "alice",
        &["share", "invite", project, email, "--role", role],
    )["id"]
        .as_str()
        .expect("invitation id")
        .to_string()
}

#[test]
fn invite_writes_an_outbox_notice() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "Vera@Example.com", "viewer");

    let outbox = std::fs::read_to_string(root.data_dir().join("outbox.jsonl")).expect("outbox");
    assert!(outbox.contains(&invitation));
    assert!(outbox.contains("vera@example.com"));

    let inbox = root.json("vera", &["share", "inbox", "vera@example.com"]);
    assert_eq!(inbox["total"], 1);
    assert_eq!(inbox["invitations"][0]["id"], invitation.as_str());
}

#[test]
fn viewer_can_read_but_not_write() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    root.json("alice", &["task", "new", &project, "Outline"]);
    let invitation = invite(&root, &project, "vera@example.com", "viewer");

    let accepted = root.json("vera", &["share", "accept", &invitation]);
    assert_eq!(accepted["status"], "accepted");

    let tasks = root.json("vera", &["task", "list", "--project", &project]);
    assert_eq!(tasks["total"], 1);

    let (code, error) = root.json_err("vera", &["task", "new", &project, "Draft"]);
    assert_eq!(code, 3);
    assert_eq!(error["kind"], "authorization");
    assert_eq!(error["details"]["user"], "vera");
}

#[test]
fn editor_can_write_and_role_changes_apply() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "ed@example.com", "editor");
    root.json("ed", &["share", "accept", &invitation]);

    root.json("ed", &["task", "new", &project, "Chapter one"]);

    let collaborator = root.json("alice", &["share", "role", &project, "ed", "viewer"]);
    assert_eq!(collaborator["role"], "viewer");
    let (code, _) = root.json_err("ed", &["task", "new", &project, "Chapter two"]);
    assert_eq!(code, 3);
}

#[test]
fn answered_invitation_cannot_be_answered_again() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "vera@example.com", "viewer");

    root.json("vera", &["share", "reject", &invitation]);
    let (code, error) = root.json_err("vera", &["share", "accept", &invitation]);
    assert_eq!(code, 3);
    assert_eq!(error["kind"], "state");
    assert_eq!(error["details"]["status"], "rejected");
}

#[test]
fn revoking_an_accepted_invitation_removes_access() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "vera@example.com", "viewer");
    root.json("vera", &["share", "accept", &invitation]);

    let revoked = root.json("alice", &["share", "revoke", &invitation]);
    assert_eq!(revoked["status"], "revoked");

    let (code, _) = root.json_err("vera", &["project", "show", &project]);
    assert_eq!(code, 3);

    let listing = root.json("alice", &["share", "list", &project]);
    assert_eq!(listing["collaborators"].as_array().expect("array").len(), 0);
}

#[test]
fn collaborator_can_leave_but_owner_cannot() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "ed@example.com", "editor");
    root.json("ed", &["share", "accept", &invitation]);

    root.json("ed", &["share", "leave", &project]);
    let listing = root.json("alice", &["share", "list", &project]);
    assert_eq!(listing["collaborators"].as_array().expect("array").len(), 0);

    let (code, _) = root.json_err("alice", &["share", "leave", &project]);
    assert_ne!(code, 0);
}

#[test]
fn viewer_cannot_invite() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "vera@example.com", "viewer");
    root.json("vera", &["share", "accept", &invitation]);

    let (code, error) = root.json_err(
        "vera",
        &["share", "invite", &project, "friend@example.com"],
    );
    assert_eq!(code, 3);
    assert_eq!(error["kind"], "authorization");
}

#[test]
fn stranger_cannot_remove_a_collaborator() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "bob@example.com", "admin");
    root.json("bob", &["share", "accept", &invitation]);

    let (code, error) = root.json_err("mallory", &["share", "remove", &project, "bob"]);
    assert_eq!(code, 3);
    assert_eq!(error["kind"], "authorization");
    assert_eq!(error["details"]["user"], "mallory");

    let (code, _) = root.json_err("mallory", &["share", "role", &project, "bob", "viewer"]);
    assert_eq!(code, 3);

    let listing = root.json("alice", &["share", "list", &project]);
    let collaborators = listing["collaborators"].as_array().expect("array");
    assert_eq!(collaborators.len(), 1);
    assert_eq!(collaborators[0]["user_id"], "bob");
    assert_eq!(collaborators[0]["role"], "admin");
}

#[test]
fn owner_removes_a_collaborator() {
    let root = TestRoot::initialized();
    let project = root.new_project("alice", "Novel");
    let invitation = invite(&root, &project, "bob@example.com", "editor");
    root.json("bob", &["share", "accept", &invitation]);

    let removed = root.json("alice", &["share", "remove", &project, "bob"]);
    assert_eq!(removed["user_id"], "bob");

    let (code, _) = root.json_err("bob", &["task", "new", &project, "Sneak in"]);
    assert_eq!(code, 3);
}
