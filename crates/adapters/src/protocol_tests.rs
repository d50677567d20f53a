use super::{ContentBlock, StreamLine, ToolResultContent};

#[test]
fn init_line_decodes() {
    let line = r#"{"type":"system","subtype":"init","session_id":"ses-1","model":"opus","tools":["Bash","Read"]}"#;
    let parsed: StreamLine = serde_json::from_str(line).unwrap();
    match parsed {
        StreamLine::System {
            subtype,
            session_id,
            model,
            tools,
        } => {
            assert_eq!(subtype.as_deref(), Some("init"));
            assert_eq!(session_id.as_deref(), Some("ses-1"));
            assert_eq!(model.as_deref(), Some("opus"));
            assert_eq!(tools, vec!["Bash", "Read"]);
        }
        other => panic!("expected System, got {other:?}"),
    }
}

#[test]
fn unknown_type_maps_to_other() {
    let parsed: StreamLine = serde_json::from_str(r#"{"type":"telemetry","x":1}"#).unwrap();
    assert!(matches!(parsed, StreamLine::Other));
}

#[test]
fn unknown_content_block_tolerated() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"hi"}]}}"#;
    let parsed: StreamLine = serde_json::from_str(line).unwrap();
    match parsed {
        StreamLine::Assistant { message } => {
            assert_eq!(message.content.len(), 2);
            assert!(matches!(message.content[0], ContentBlock::Other));
            assert!(matches!(message.content[1], ContentBlock::Text { .. }));
        }
        other => panic!("expected Assistant, got {other:?}"),
    }
}

#[test]
fn tool_result_string_content() {
    let content: ToolResultContent = serde_json::from_str(r#""plain output""#).unwrap();
    assert_eq!(content.joined_text(), "plain output");
}

#[test]
fn tool_result_block_content_concatenates_text() {
    let content: ToolResultContent = serde_json::from_str(
        r#"[{"type":"text","text":"a"},{"type":"image","source":{}},{"type":"text","text":"b"}]"#,
    )
    .unwrap();
    assert_eq!(content.joined_text(), "ab");
}

#[test]
fn result_line_defaults() {
    let parsed: StreamLine = serde_json::from_str(r#"{"type":"result"}"#).unwrap();
    match parsed {
        StreamLine::Result {
            subtype,
            usage,
            is_error,
            ..
        } => {
            assert!(subtype.is_none());
            assert!(usage.is_none());
            assert!(!is_error);
        }
        other => panic!("expected Result, got {other:?}"),
    }
}
