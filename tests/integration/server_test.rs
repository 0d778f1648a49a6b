//! End-to-end tests for the notary-server binary.

mod helpers;

#[test]
fn test_batch_is_decided_in_order() {
    let batch = helpers::batch_line(&[
        helpers::request("issue", Vec::new(), 1),
        helpers::request("spend", vec![helpers::output("issue", 0)], 1),
        helpers::request("double-spend", vec![helpers::output("issue", 0)], 1),
    ]);

    let output = helpers::run_server(&batch, &[]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let responses = helpers::responses(&output);
    assert_eq!(responses.len(), 1);
    let results = responses[0]["results"].as_array().expect("results");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["result"]["status"], "accepted");
    assert_eq!(results[1]["result"]["status"], "accepted");
    assert_eq!(results[2]["result"]["status"], "rejected");
    assert_eq!(results[2]["result"]["error"]["type"], "input_state_conflict");
    assert_eq!(results[2]["holding_identity"], "ALICE");
}

#[test]
fn test_unparseable_line_fails_only_its_batch() {
    let mut input = String::from("not json\n\n");
    input.push_str(&helpers::batch_line(&[helpers::request("issue", Vec::new(), 1)]));

    let output = helpers::run_server(&input, &[]);
    assert!(output.status.success());

    let responses = helpers::responses(&output);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["batch"], 1);
    assert_eq!(responses[0]["error"]["kind"], "Serialization");
    assert_eq!(responses[1]["batch"], 2);
    assert_eq!(responses[1]["results"][0]["result"]["status"], "accepted");
}

#[test]
fn test_inline_processing_without_worker_pool() {
    let batch = helpers::batch_line(&[helpers::request("issue", Vec::new(), 2)]);

    let output = helpers::run_server(&batch, &[("NOTARY__WORKER__ENABLED", "false")]);
    assert!(output.status.success());

    let responses = helpers::responses(&output);
    assert_eq!(responses[0]["results"][0]["result"]["status"], "accepted");
}

#[test]
fn test_postgres_without_url_refuses_to_start() {
    let output = helpers::run_server(
        "",
        &[
            ("NOTARY__BACKING_STORE__KIND", "postgres"),
            ("NOTARY__DATABASE__URL", ""),
        ],
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
