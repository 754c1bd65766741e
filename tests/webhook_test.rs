use contributor_reputation::webhook::PushEvent;

#[test]
fn test_push_payload_becomes_a_request_for_the_sender() {
    let payload = r#"{
        "ref": "refs/heads/main",
        "repository": { "id": 1, "name": "widgets", "full_name": "acme/widgets", "owner": { "login": "acme" } },
        "sender": { "login": "alice", "id": 2 }
    }"#;

    let request = PushEvent::from_json(payload).unwrap().score_request();
    assert_eq!(request.owner, "acme");
    assert_eq!(request.repo, "widgets");
    assert_eq!(request.contributor.as_deref(), Some("alice"));
}

#[test]
fn test_malformed_payload_is_invalid_input() {
    let err = PushEvent::from_json(r#"{ "repository": {} }"#).unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
}
