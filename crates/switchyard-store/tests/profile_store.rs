use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::thread;
use switchyard_core::{LlmProfile, ProfileError, SECRET_FIELDS};
use switchyard_testkit::{ProfileFixture, sample_profile, secret_profile};

#[test]
fn save_without_secrets_strips_them_on_disk_and_on_load() {
    let fixture = ProfileFixture::new().expect("fixture");
    let store = fixture.store();
    let alpha = LlmProfile {
        api_key: Some("secret".into()),
        ..LlmProfile::new("m1", "agent")
    };

    store.save("alpha", &alpha, false).expect("save");

    let on_disk = fixture.read_raw("alpha").expect("raw");
    assert!(on_disk.get("api_key").is_none());
    assert_eq!(on_disk["profile_id"], "alpha");
    assert_eq!(store.list().expect("list"), vec!["alpha"]);

    let loaded = store.load("alpha").expect("load");
    assert!(loaded.api_key.is_none());
    assert_eq!(loaded.profile_id.as_deref(), Some("alpha"));
    assert_eq!(loaded.model, "m1");
}

#[test]
fn save_with_secrets_round_trips_credentials() {
    let fixture = ProfileFixture::new().expect("fixture");
    let original = secret_profile("gpt-4o-mini", "service");

    fixture
        .store()
        .save("sample", &original, true)
        .expect("save with secrets");

    let on_disk = fixture.read_raw("sample").expect("raw");
    assert_eq!(on_disk["api_key"], "secret");
    assert_eq!(on_disk["aws_access_key_id"], "id");
    assert_eq!(on_disk["aws_secret_access_key"], "value");

    let loaded = fixture.store().load("sample").expect("load");
    assert_eq!(loaded, original.with_profile_id("sample"));
}

#[test]
fn default_save_omits_every_secret_field() {
    let fixture = ProfileFixture::new().expect("fixture");
    fixture
        .store()
        .save("sample", &secret_profile("gpt-4o-mini", "service"), false)
        .expect("save");

    let on_disk = fixture.read_raw("sample").expect("raw");
    for field in SECRET_FIELDS {
        assert!(on_disk.get(*field).is_none(), "{field} leaked to disk");
    }
    assert_eq!(on_disk["usage_id"], "service");
}

#[test]
fn load_forces_profile_id_to_the_filename_stem() {
    let fixture = ProfileFixture::new().expect("fixture");
    fixture
        .write_raw(
            "foo",
            &json!({"model": "gpt-4o-mini", "usage_id": "svc", "profile_id": "someone-else"}),
        )
        .expect("write");
    fixture
        .write_raw("bare", &json!({"model": "gpt-4o-mini", "service_id": "svc"}))
        .expect("write");

    let foo = fixture.store().load("foo").expect("load foo");
    assert_eq!(foo.profile_id.as_deref(), Some("foo"));
    assert_eq!(foo.usage_id, "svc");

    let bare = fixture.store().load("bare").expect("load bare");
    assert_eq!(bare.profile_id.as_deref(), Some("bare"));

    // The document on disk is left as it was.
    assert_eq!(fixture.read_raw("foo").expect("raw")["profile_id"], "someone-else");
}

#[test]
fn load_rejects_unknown_fields_with_their_paths() {
    let fixture = ProfileFixture::new().expect("fixture");
    fixture
        .write_raw(
            "strict",
            &json!({"model": "m", "colour": "blue", "temprature": 0.3}),
        )
        .expect("write");

    let err = fixture.store().load("strict").expect_err("unknown fields");
    let ProfileError::Validation { errors } = err else {
        panic!("expected validation error, got {err}");
    };
    assert_eq!(
        errors,
        vec![
            "colour: unknown field".to_string(),
            "temprature: unknown field".to_string()
        ]
    );
}

#[test]
fn loads_return_independent_values() {
    let fixture = ProfileFixture::new().expect("fixture");
    fixture
        .store()
        .save("alpha", &sample_profile("m1", "agent"), false)
        .expect("save");

    let mut first = fixture.store().load("alpha").expect("first");
    first.model = "mutated".to_string();
    let second = fixture.store().load("alpha").expect("second");
    assert_eq!(second.model, "m1");
}

#[test]
fn validate_is_non_raising() {
    let fixture = ProfileFixture::new().expect("fixture");
    let store = fixture.store();

    let ok = store.validate(&json!({"model": "gpt-4o-mini", "usage_id": "svc"}));
    assert!(ok.is_valid());
    assert!(ok.errors().is_empty());

    let bad = store.validate(&json!({"usage_id": "svc"}));
    assert!(!bad.is_valid());
    assert!(bad.errors().iter().any(|message| message.contains("model")));
    assert!(!store.root().exists());
}

#[test]
fn concurrent_saves_leave_one_complete_document() {
    let fixture = Arc::new(ProfileFixture::new().expect("fixture"));
    let writers: Vec<_> = ["writer-a", "writer-b"]
        .into_iter()
        .map(|writer| {
            let fixture = Arc::clone(&fixture);
            thread::spawn(move || {
                for round in 0..25 {
                    let profile = LlmProfile {
                        base_url: Some(format!("https://{writer}.example.dev")),
                        reasoning_effort: Some(writer.to_string()),
                        seed: Some(round),
                        ..LlmProfile::new(format!("model-{writer}"), "agent")
                    };
                    fixture.store().save("x", &profile, false).expect("save");
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread");
    }

    let loaded = fixture.store().load("x").expect("load");
    let writer = loaded.reasoning_effort.clone().expect("writer tag");
    assert_eq!(loaded.model, format!("model-{writer}"));
    assert_eq!(
        loaded.base_url.as_deref(),
        Some(format!("https://{writer}.example.dev").as_str())
    );

    let leftovers: Vec<_> = fs::read_dir(fixture.store().root())
        .expect("read root")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name() != "x.json")
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}
