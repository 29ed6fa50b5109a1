#![allow(clippy::unwrap_used, clippy::expect_used)]

use warroom_core::*;

// ---------------------------------------------------------------------------
// 1. Event serialization keeps identity and flags
// ---------------------------------------------------------------------------

#[test]
fn event_serialization_roundtrip() {
    let event = Event::new(
        BranchId::new(1, "logistics_agent"),
        "logistics_agent",
        EventContent::text("Spot price is $32,000"),
    )
    .terminal();
    let id = event.id();
    let timestamp = event.timestamp();

    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.id(), id);
    assert_eq!(parsed.timestamp(), timestamp);
    assert!(parsed.is_terminal());
    assert_eq!(parsed.branch(), &BranchId::new(1, "logistics_agent"));
    assert_eq!(parsed.content().as_text(), Some("Spot price is $32,000"));
}

// ---------------------------------------------------------------------------
// 2. Tool call payloads travel inside events
// ---------------------------------------------------------------------------

#[test]
fn tool_call_and_result_as_event_payloads() {
    let call = ToolCall {
        id: "call_abc123".to_string(),
        name: "fetch_spot_prices".to_string(),
        arguments: serde_json::json!({"chip_type": "H100"}),
    };
    let result = ToolResult::success(&call.id, r#"{"price":32000}"#);

    let call_event = Event::new(
        BranchId::new(0, "logistics_agent"),
        "logistics_agent",
        EventContent::ToolCall { call: call.clone() },
    );
    let result_event = Event::new(
        BranchId::new(0, "logistics_agent"),
        "logistics_agent",
        EventContent::ToolResult {
            result: result.clone(),
        },
    );

    match call_event.into_content() {
        EventContent::ToolCall { call: inner } => assert_eq!(inner, call),
        other => panic!("unexpected payload: {other:?}"),
    }
    match result_event.content() {
        EventContent::ToolResult { result: inner } => {
            assert_eq!(inner.call_id, "call_abc123");
            assert_eq!(inner.json().unwrap()["price"], 32000);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 3. Error taxonomy
// ---------------------------------------------------------------------------

#[test]
fn error_variants_display_their_subsystem() {
    let cases: Vec<(WarroomError, &str)> = vec![
        (WarroomError::Config("no branches".into()), "Config error"),
        (WarroomError::Agent("too many turns".into()), "Agent error"),
        (WarroomError::Skill("unknown".into()), "Skill error"),
        (WarroomError::Database("locked".into()), "Database error"),
        (WarroomError::Http("timeout".into()), "HTTP error"),
        (WarroomError::Security("traversal".into()), "Security error"),
        (WarroomError::Report("sink down".into()), "Report error"),
        (WarroomError::Orchestrator("cancelled".into()), "Orchestrator error"),
    ];
    for (err, prefix) in cases {
        assert!(
            err.to_string().starts_with(prefix),
            "'{err}' should start with '{prefix}'"
        );
    }
}

#[test]
fn json_error_converts() {
    let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
    let err: WarroomError = parse.unwrap_err().into();
    assert!(matches!(err, WarroomError::Json(_)));
}
