use assert_cmd::Command;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn switchyard(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("switchyard"));
    cmd.env("HOME", home)
        .env_remove("USERPROFILE")
        .env_remove("SWITCHYARD_PROFILES_DIR")
        .env_remove("SWITCHYARD_SETTINGS")
        .env_remove("SWITCHYARD_INLINE_CONVERSATIONS")
        .env_remove("SWITCHYARD_LOG");
    cmd
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    let output = switchyard(home)
        .arg("--json")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("json output")
}

fn run_json_failure(home: &Path, args: &[&str]) -> Value {
    let output = switchyard(home)
        .arg("--json")
        .args(args)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("json output")
}

#[test]
fn profile_lifecycle_round_trips_json() {
    let home = TempDir::new().expect("home");

    let empty = run_json(home.path(), &["profile", "list"]);
    assert_eq!(empty["profiles"], json!([]));

    let created = run_json(
        home.path(),
        &[
            "profile",
            "create",
            "fast-gpt",
            "model=openai/gpt-4o-mini",
            "temperature=0.2",
            "api_key=sk-test",
        ],
    );
    assert_eq!(created["usage_id"], "agent");

    let stored_path = home.path().join(".switchyard/llm-profiles/fast-gpt.json");
    let stored: Value =
        serde_json::from_str(&fs::read_to_string(&stored_path).expect("stored")).expect("json");
    assert!(stored.get("api_key").is_none());
    assert_eq!(stored["profile_id"], "fast-gpt");

    let listed = run_json(home.path(), &["profile", "list"]);
    assert_eq!(listed["profiles"], json!(["fast-gpt"]));

    let edited = run_json(
        home.path(),
        &["profile", "edit", "fast-gpt", "reasoning_effort=high"],
    );
    assert_eq!(edited["model"], "openai/gpt-4o-mini");

    let shown = run_json(home.path(), &["profile", "show", "fast-gpt"]);
    assert_eq!(shown["reasoning_effort"], "high");
    assert_eq!(shown["temperature"], 0.2);

    let deleted = run_json(home.path(), &["profile", "delete", "fast-gpt"]);
    assert_eq!(deleted["deleted"], "fast-gpt");
    assert!(!stored_path.exists());
}

#[test]
fn show_redacts_stored_secrets() {
    let home = TempDir::new().expect("home");
    switchyard(home.path())
        .env("SWITCHYARD_TEST_KEY", "sk-from-env")
        .args([
            "--json",
            "profile",
            "create",
            "keyed",
            "model=m1",
            "api_key=ENV[SWITCHYARD_TEST_KEY]",
            "--include-secrets",
        ])
        .assert()
        .success();

    let stored_path = home.path().join(".switchyard/llm-profiles/keyed.json");
    let stored: Value =
        serde_json::from_str(&fs::read_to_string(&stored_path).expect("stored")).expect("json");
    assert_eq!(stored["api_key"], "sk-from-env");

    let shown = run_json(home.path(), &["profile", "show", "keyed"]);
    assert_eq!(shown["api_key"], "****");
}

#[test]
fn unsafe_profile_ids_fail_with_structured_error() {
    let home = TempDir::new().expect("home");
    let out = run_json_failure(home.path(), &["profile", "show", "../../etc/passwd"]);
    assert_eq!(out["error"]["title"], "Invalid Profile Id");
    assert_eq!(out["error"]["error_type"], "validation");
}

#[test]
fn validate_reports_every_problem_and_fails() {
    let home = TempDir::new().expect("home");
    let doc = home.path().join("candidate.json");
    fs::write(&doc, r#"{"usage_id": "agent", "colour": "blue"}"#).expect("doc");

    let out = run_json_failure(home.path(), &["profile", "validate", doc.to_str().expect("utf8")]);
    assert_eq!(out["valid"], false);
    let errors = out["errors"].as_array().expect("errors");
    assert!(errors.iter().any(|e| e == "colour: unknown field"));
    assert!(errors.iter().any(|e| e == "model: field required"));

    fs::write(&doc, r#"{"model": "m1"}"#).expect("doc");
    let out = run_json(home.path(), &["profile", "validate", doc.to_str().expect("utf8")]);
    assert_eq!(out["valid"], true);
}

#[test]
fn settings_switch_rewrites_references() {
    let home = TempDir::new().expect("home");
    run_json(home.path(), &["profile", "create", "mini", "model=m-mini"]);
    run_json(home.path(), &["profile", "create", "pro", "model=m-pro"]);

    let input = home.path().join("settings-input.json");
    fs::write(
        &input,
        json!({
            "agent": {"llm": {"model": "m-mini", "usage_id": "agent", "profile_id": "mini"}},
            "condenser": {"llm": {"model": "m-small", "usage_id": "condenser"}},
        })
        .to_string(),
    )
    .expect("input");
    let settings = home.path().join("agent_settings.json");
    let settings_arg = settings.to_str().expect("utf8");

    let saved = run_json(
        home.path(),
        &["settings", "save", input.to_str().expect("utf8"), "--path", settings_arg, "--reference"],
    );
    assert_eq!(saved["inline"], false);

    let switched = run_json(
        home.path(),
        &["settings", "switch", "agent", "pro", "--path", settings_arg, "--reference"],
    );
    assert_eq!(switched["model"], "m-pro");
    assert_eq!(switched["changed"], true);

    let on_disk: Value =
        serde_json::from_str(&fs::read_to_string(&settings).expect("settings")).expect("json");
    assert_eq!(on_disk["agent"]["llm"], json!({"profile_id": "pro"}));
    assert_eq!(on_disk["condenser"]["llm"]["model"], "m-small");

    let again = run_json(
        home.path(),
        &["settings", "switch", "agent", "pro", "--path", settings_arg, "--reference"],
    );
    assert_eq!(again["changed"], false);

    let shown = run_json(
        home.path(),
        &["settings", "show", "--path", settings_arg, "--reference"],
    );
    assert_eq!(shown["agent"]["llm"]["model"], "m-pro");
    assert_eq!(shown["agent"]["llm"]["usage_id"], "agent");
}

#[test]
fn inline_mode_blocks_switching_and_reference_expansion() {
    let home = TempDir::new().expect("home");
    let settings = home.path().join("agent_settings.json");
    fs::write(&settings, r#"{"agent": {"llm": {"profile_id": "mini"}}}"#).expect("settings");
    let settings_arg = settings.to_str().expect("utf8");

    let out = run_json_failure(
        home.path(),
        &["settings", "switch", "agent", "mini", "--path", settings_arg],
    );
    assert_eq!(out["error"]["title"], "Persistence Mode Conflict");

    let out = run_json_failure(home.path(), &["settings", "show", "--path", settings_arg]);
    assert_eq!(out["error"]["error_type"], "configuration");
}

#[test]
fn inline_default_follows_the_environment() {
    let home = TempDir::new().expect("home");
    let settings = home.path().join("agent_settings.json");
    fs::write(&settings, r#"{"agent": {"llm": {"profile_id": "mini"}}}"#).expect("settings");

    switchyard(home.path())
        .env("SWITCHYARD_INLINE_CONVERSATIONS", "false")
        .args(["--json", "profile", "create", "mini", "model=m-mini"])
        .assert()
        .success();
    let output = switchyard(home.path())
        .env("SWITCHYARD_INLINE_CONVERSATIONS", "false")
        .args(["--json", "settings", "show", "--path", settings.to_str().expect("utf8")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let shown: Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(shown["agent"]["llm"]["model"], "m-mini");
}

#[test]
fn switching_a_slot_to_a_shared_profile_survives_reload() {
    let home = TempDir::new().expect("home");
    run_json(home.path(), &["profile", "create", "mini", "model=m-mini"]);
    run_json(
        home.path(),
        &["profile", "create", "small", "model=m-small", "usage_id=condenser"],
    );

    let input = home.path().join("settings-input.json");
    fs::write(
        &input,
        json!({
            "agent": {"llm": {"model": "m-mini", "usage_id": "agent", "profile_id": "mini"}},
            "condenser": {"llm": {"model": "m-small", "usage_id": "condenser", "profile_id": "small"}},
        })
        .to_string(),
    )
    .expect("input");
    let settings = home.path().join("agent_settings.json");
    let settings_arg = settings.to_str().expect("utf8");
    run_json(
        home.path(),
        &["settings", "save", input.to_str().expect("utf8"), "--path", settings_arg, "--reference"],
    );

    let switched = run_json(
        home.path(),
        &["settings", "switch", "condenser", "mini", "--path", settings_arg, "--reference"],
    );
    assert_eq!(switched["usage_id"], "condenser");
    let on_disk: Value =
        serde_json::from_str(&fs::read_to_string(&settings).expect("settings")).expect("json");
    assert_eq!(on_disk["condenser"]["llm"], json!({"profile_id": "mini"}));

    let shown = run_json(
        home.path(),
        &["settings", "show", "--path", settings_arg, "--reference"],
    );
    assert_eq!(shown["condenser"]["llm"]["usage_id"], "condenser");
    assert_eq!(shown["agent"]["llm"]["usage_id"], "agent");

    let back = run_json(
        home.path(),
        &["settings", "switch", "condenser", "small", "--path", settings_arg, "--reference"],
    );
    assert_eq!(back["model"], "m-small");
    assert_eq!(back["changed"], true);

    let agent = run_json(
        home.path(),
        &["settings", "switch", "agent", "small", "--path", settings_arg, "--reference"],
    );
    assert_eq!(agent["usage_id"], "agent");
    assert_eq!(agent["changed"], true);
}
