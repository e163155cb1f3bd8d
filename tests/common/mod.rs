use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use chatstream::storage::SqliteSessionStore;

#[allow(dead_code)]
pub fn create_temp_store() -> (SqliteSessionStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let store =
        SqliteSessionStore::new_with_path(db_path).expect("failed to create sqlite store with path");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Build an event stream body with one `data: ` frame per JSON value
#[allow(dead_code)]
pub fn sse_body(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect()
}

/// Events of the reference turn: thinking, answer, done for session `s1`
#[allow(dead_code)]
pub fn reference_events() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({"type": "start", "session_id": "s1"}),
        serde_json::json!({"type": "thinking", "content": "step1"}),
        serde_json::json!({"type": "thinking", "content": "step2"}),
        serde_json::json!({"type": "thinking_end", "duration": 2.0}),
        serde_json::json!({"type": "content", "content": "Hello"}),
        serde_json::json!({"type": "done", "content": "Hello", "session_id": "s1"}),
    ]
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
