//! Shared test helpers for integration tests.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use chrono::{Duration, Utc};
use serde_json::Value;

use notary_entity::{HoldingIdentity, SecureHash, StateRef, UniquenessCheckRequest};

/// Run `notary-server` against the in-memory store, feed it `input`, and
/// wait for it to exit after stdin closes.
pub fn run_server(input: &str, extra_env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_notary-server"));
    command
        .env("NOTARY_ENV", "test")
        .env("NOTARY__BACKING_STORE__KIND", "memory")
        .env("NOTARY__LOGGING__LEVEL", "warn")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in extra_env {
        command.env(key, value);
    }

    let mut child = command.spawn().expect("Failed to spawn notary-server");
    {
        let mut stdin = child.stdin.take().expect("stdin is piped");
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write batches");
    }
    child.wait_with_output().expect("Failed to wait for notary-server")
}

/// Parse stdout into response lines sorted by batch number
pub fn responses(output: &Output) -> Vec<Value> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines: Vec<Value> = stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("response is JSON"))
        .collect();
    lines.sort_by_key(|v| v["batch"].as_u64());
    lines
}

/// A request from ALICE with an hour-long window starting now
pub fn request(name: &str, inputs: Vec<StateRef>, outputs: u32) -> UniquenessCheckRequest {
    let now = Utc::now();
    UniquenessCheckRequest {
        holding_identity: HoldingIdentity::new("ALICE").expect("valid identity"),
        tx_id: SecureHash::sha256(name),
        input_states: inputs,
        reference_states: Vec::new(),
        num_output_states: outputs,
        time_window_lower_bound: Some(now - Duration::minutes(5)),
        time_window_upper_bound: now + Duration::hours(1),
    }
}

/// Output `index` of transaction `name`
pub fn output(name: &str, index: u32) -> StateRef {
    StateRef::new(SecureHash::sha256(name), index)
}

/// One batch as an input line
pub fn batch_line(requests: &[UniquenessCheckRequest]) -> String {
    let mut line = serde_json::to_string(requests).expect("serialize batch");
    line.push('\n');
    line
}
