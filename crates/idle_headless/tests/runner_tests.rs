//! End-to-end tests for the JSON-lines runner.

use std::io::Cursor;

use idle_core::engine::Engine;
use idle_core::persistence::{MemoryStore, SnapshotStore};
use idle_headless::protocol::Command;
use idle_headless::runner::{HeadlessConfig, HeadlessRunner};
use idle_headless::store::FileStore;
use idle_test_utils::fixtures::standard_engine;
use serde_json::Value;

fn simulated(start_millis: u64) -> HeadlessConfig {
    HeadlessConfig {
        simulated: true,
        start_millis,
    }
}

/// Feed `script` to a runner and return every output line as JSON.
fn drive<S: SnapshotStore>(runner: &mut HeadlessRunner<S>, script: &[&str]) -> Vec<Value> {
    let input = Cursor::new(script.join("\n"));
    let mut output = Vec::new();
    runner.run(input, &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// =============================================================================
// Protocol session
// =============================================================================

mod session {
    use super::*;

    #[test]
    fn test_scripted_session() {
        let mut runner = HeadlessRunner::start(standard_engine(), MemoryStore::new(), &simulated(0));
        let out = drive(
            &mut runner,
            &[
                r#"{"cmd":"query"}"#,
                r#"{"cmd":"click"}"#,
                r#"{"cmd":"purchase","upgrade_id":2,"quantity":"max"}"#,
                r#"{"cmd":"advance","seconds":60}"#,
                r#"{"cmd":"hash"}"#,
                "not json",
                r#"{"cmd":"quit"}"#,
                r#"{"cmd":"click"}"#,
            ],
        );

        let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
        assert_eq!(
            types,
            ["ready", "state", "state", "rejected", "state", "hash", "error", "goodbye"]
        );

        assert_eq!(out[0]["simulated"], true);
        assert_eq!(out[2]["report"]["currency"], 1.0);
        assert_eq!(out[3]["reason"], "insufficient_funds");
        assert_eq!(out[4]["report"]["currency"], 7.0);
        assert_eq!(out[4]["report"]["last_update"], 60_000);
        assert_eq!(out[5]["last_update"], 60_000);
        assert_eq!(
            out[5]["hash"].as_u64(),
            Some(runner.session().state().state_hash())
        );
    }

    #[test]
    fn test_end_of_input_says_goodbye() {
        let mut runner = HeadlessRunner::start(standard_engine(), MemoryStore::new(), &simulated(0));
        let out = drive(&mut runner, &[r#"{"cmd":"click"}"#, ""]);
        assert_eq!(out.last().unwrap()["type"], "goodbye");
        assert_eq!(runner.session().store().save_count(), 1);
    }

    #[test]
    fn test_reconcile_reports_offline_only_above_threshold() {
        let mut runner = HeadlessRunner::start(standard_engine(), MemoryStore::new(), &simulated(0));
        let out = drive(
            &mut runner,
            &[
                r#"{"cmd":"reconcile","seconds":3}"#,
                r#"{"cmd":"reconcile","seconds":50}"#,
            ],
        );
        assert_eq!(out[1]["type"], "state");
        assert_eq!(out[1]["report"]["currency"], 0.0);
        assert_eq!(out[2]["type"], "offline");
        assert_eq!(out[2]["elapsed_seconds"], 50.0);
        assert!((out[2]["earnings"].as_f64().unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut runner = HeadlessRunner::start(standard_engine(), MemoryStore::new(), &simulated(0));
        let out = drive(
            &mut runner,
            &[
                r#"{"cmd":"click"}"#,
                r#"{"cmd":"click"}"#,
                r#"{"cmd":"reset"}"#,
            ],
        );
        assert_eq!(out[3]["type"], "state");
        assert_eq!(out[3]["report"]["currency"], 0.0);
        assert_eq!(out[3]["report"]["stats"]["total_clicks"], 0);
    }

    #[test]
    fn test_negative_quantity_is_invalid() {
        let mut runner = HeadlessRunner::start(standard_engine(), MemoryStore::new(), &simulated(0));
        let out = drive(
            &mut runner,
            &[r#"{"cmd":"purchase","upgrade_id":1,"quantity":-3}"#],
        );
        assert_eq!(out[1]["type"], "rejected");
        assert_eq!(out[1]["reason"], "invalid_quantity");
    }

    #[test]
    fn test_wall_clock_mode_refuses_time_commands() {
        let mut runner = HeadlessRunner::start(
            Engine::default(),
            MemoryStore::new(),
            &HeadlessConfig::default(),
        );
        assert!(!runner.is_simulated());

        let response = runner.handle(&Command::Advance { seconds: 10.0 });
        let value: Value = serde_json::from_str(response.to_json_line().trim()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["cmd"], "advance");
    }

    #[test]
    fn test_negative_advance_is_an_error() {
        let mut runner = HeadlessRunner::start(standard_engine(), MemoryStore::new(), &simulated(0));
        let out = drive(&mut runner, &[r#"{"cmd":"advance","seconds":-1}"#]);
        assert_eq!(out[1]["type"], "error");
        assert_eq!(runner.session().state().last_update().as_millis(), 0);
    }
}

// =============================================================================
// Persistence through the runner
// =============================================================================

mod persistence {
    use super::*;

    #[test]
    fn test_restart_from_file_credits_offline_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");

        let mut first = HeadlessRunner::start(standard_engine(), FileStore::new(&path), &simulated(0));
        let out = drive(
            &mut first,
            &[r#"{"cmd":"advance","seconds":100}"#, r#"{"cmd":"save"}"#],
        );
        assert_eq!(out[2]["type"], "saved");
        assert_eq!(out[2]["last_update"], 100_000);
        assert!(path.exists());

        let mut second =
            HeadlessRunner::start(standard_engine(), FileStore::new(&path), &simulated(200_000));
        let out = drive(&mut second, &[r#"{"cmd":"query"}"#]);
        assert_eq!(out[0]["type"], "ready");
        assert_eq!(out[1]["type"], "offline");
        assert!((out[1]["earnings"].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert!((out[2]["report"]["currency"].as_f64().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        std::fs::write(&path, "{ definitely not a save").unwrap();

        let runner = HeadlessRunner::start(standard_engine(), FileStore::new(&path), &simulated(0));
        assert_eq!(runner.session().state().currency(), 0.0);
        assert!(!path.exists());
    }
}
