//! End-to-end replay tests
//!
//! Each test replays a scenario into an in-memory buffer and checks the
//! emitted JSON lines.

use ordsync_replay::{replay, ReplayConfig, ReplayError, Scenario};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Write;

async fn run_with(scenario: &Scenario, config: &ReplayConfig) -> Vec<Value> {
    let sink = replay(scenario, config, Vec::new()).await.unwrap();
    String::from_utf8(sink.into_inner())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

async fn run(text: &str) -> Vec<Value> {
    let scenario = Scenario::from_toml(text).unwrap();
    run_with(&scenario, &ReplayConfig::default()).await
}

const CATALOGUE: &str = r#"
    [[items]]
    id = "a"
    [[items]]
    id = "b"
    [[items]]
    id = "c"
    delay_ms = 50
    [[items]]
    id = "d"
    [[items]]
    id = "e"
"#;

#[tokio::test(start_paused = true)]
async fn test_remove_then_append_run() {
    let events = run(&format!(
        r#"{}
        [[steps]]
        order = ["a", "b", "c"]
        [[steps]]
        wait_ms = 10
        [[steps]]
        order = ["a", "c", "d", "e"]
        "#,
        CATALOGUE
    ))
    .await;

    assert_eq!(
        events,
        vec![
            json!({"op": "replace_all", "len": 3}),
            json!({"op": "remove", "index": 1, "id": "b"}),
            json!({"op": "insert", "index": 2, "id": "d"}),
            json!({"op": "insert", "index": 3, "id": "e"}),
            json!({"final": ["a", "c", "d", "e"]}),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_pushes_during_slow_fetch_coalesce() {
    let events = run(&format!(
        r#"{}
        [[steps]]
        order = ["a", "b"]
        [[steps]]
        wait_ms = 10
        [[steps]]
        order = ["a", "b", "c"]
        [[steps]]
        order = ["a", "b", "d"]
        [[steps]]
        order = ["a", "b", "e"]
        "#,
        CATALOGUE
    ))
    .await;

    assert_eq!(
        events,
        vec![
            json!({"op": "replace_all", "len": 2}),
            json!({"op": "insert", "index": 2, "id": "c"}),
            json!({"op": "remove", "index": 2, "id": "c"}),
            json!({"op": "insert", "index": 2, "id": "e"}),
            json!({"final": ["a", "b", "e"]}),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_item_is_reported_and_skipped() {
    let events = run(
        r#"
        [[items]]
        id = "a"
        [[items]]
        id = "b"
        fail = true
        [[items]]
        id = "c"

        [[steps]]
        order = ["a", "b", "c"]
        "#,
    )
    .await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], json!({"op": "replace_all", "len": 2}));
    assert_eq!(events[1]["op"], "fetch_failed");
    assert_eq!(events[1]["id"], "b");
    assert_eq!(events[2], json!({"final": ["a", "c"]}));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_move_restores_previous_order() {
    let events = run(&format!(
        r#"
        reject_reorders = true
        {}
        [[steps]]
        order = ["a", "b", "d"]
        [[steps]]
        wait_ms = 10
        [[steps]]
        move = {{ from = 0, to = 2 }}
        "#,
        CATALOGUE
    ))
    .await;

    assert_eq!(
        events,
        vec![
            json!({"op": "replace_all", "len": 3}),
            json!({"op": "move", "from": 0, "to": 2, "id": "a"}),
            json!({"op": "replace_all", "len": 3}),
            json!({"final": ["a", "b", "d"]}),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_bundled_folders_scenario() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/folders.toml");
    let scenario = Scenario::load(path).unwrap();

    let events = run_with(&scenario, &ReplayConfig::default()).await;

    let ops: Vec<&str> = events
        .iter()
        .filter_map(|event| event["op"].as_str())
        .collect();
    assert_eq!(
        ops,
        vec![
            "replace_all",
            "insert",
            "remove",
            "fetch_failed",
            "insert",
            "move"
        ]
    );
    assert_eq!(
        events.last(),
        Some(&json!({"final": ["archive", "inbox", "drafts", "trash"]}))
    );
}

#[tokio::test]
async fn test_scenario_file_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[steps]]\norder = 3").unwrap();

    let result = Scenario::load(file.path());
    assert!(matches!(result, Err(ReplayError::Scenario(_))));

    let result = Scenario::load("/nonexistent/scenario.toml");
    assert!(matches!(result, Err(ReplayError::Io(_))));
}

struct ClosedOutput;

impl Write for ClosedOutput {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_unwritable_output_fails_the_replay() {
    let scenario = Scenario::from_toml(&format!(
        r#"{}
        [[steps]]
        order = ["a", "b"]
        [[steps]]
        wait_ms = 10
        [[steps]]
        order = ["b"]
        "#,
        CATALOGUE
    ))
    .unwrap();

    let result = replay(&scenario, &ReplayConfig::default(), ClosedOutput).await;
    assert!(matches!(result, Err(ReplayError::Output(2))));
}
