// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn success_envelope_keeps_data_opaque() {
    let envelope: Envelope = serde_json::from_str(
        r#"{"success": true, "message": "ok", "data": {"tasks": [], "count": 0}}"#,
    )
    .unwrap();

    assert!(envelope.success);
    assert_eq!(envelope.data["count"], 0);
    assert!(envelope.error.is_none());
}

#[test]
fn failure_envelope_surfaces_error_message() {
    let envelope: Envelope = serde_json::from_str(
        r#"{"success": false, "message": "", "data": null,
            "error": {"message": "agent not registered", "code": "AGENT_UNKNOWN"}}"#,
    )
    .unwrap();

    assert!(!envelope.success);
    assert_eq!(envelope.error_message(), "agent not registered");
    assert_eq!(envelope.error.as_ref().unwrap().code, "AGENT_UNKNOWN");
}

#[test]
fn failure_without_error_body_gets_placeholder() {
    let envelope: Envelope =
        serde_json::from_str(r#"{"success": false, "message": "", "data": null}"#).unwrap();

    assert_eq!(envelope.error_message(), "unknown error");
}
