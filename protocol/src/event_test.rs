use super::*;
use crate::model::Author;
use serde_json::json;
use time::macros::datetime;

fn sample_message() -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        board_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        content: Some("hi".into()),
        file_name: None,
        file_url: None,
        created_at: datetime!(2024-05-01 12:30:00 UTC),
        user: Author { id: Uuid::new_v4(), username: "alice".into(), first_name: Some("Alice".into()), last_name: None },
    }
}

// =============================================================================
// CLIENT EVENTS
// =============================================================================

#[test]
fn join_board_uses_envelope_with_plain_string_payload() {
    let event = ClientEvent::JoinBoard("42".into());
    let value: serde_json::Value = serde_json::from_str(&event.to_text().unwrap()).unwrap();
    assert_eq!(value, json!({"event": "join-board", "data": "42"}));
}

#[test]
fn chat_submission_parses_camel_case_fields() {
    let text = r#"{"event":"chat-message","data":{"boardId":"b","userId":"u","content":"hello","fileName":"a.txt","fileData":"data:text/plain;base64,aGk="}}"#;
    let ClientEvent::ChatMessage(sub) = ClientEvent::from_text(text).unwrap() else {
        panic!("expected chat-message");
    };
    assert_eq!(sub.board_id, "b");
    assert_eq!(sub.user_id, "u");
    assert_eq!(sub.content.as_deref(), Some("hello"));
    assert_eq!(sub.file_name.as_deref(), Some("a.txt"));
    assert!(sub.file_data.is_some());
}

#[test]
fn chat_submission_accepts_missing_and_null_content() {
    let missing = r#"{"event":"chat-message","data":{"boardId":"b","userId":"u"}}"#;
    let null = r#"{"event":"chat-message","data":{"boardId":"b","userId":"u","content":null}}"#;
    for text in [missing, null] {
        let ClientEvent::ChatMessage(sub) = ClientEvent::from_text(text).unwrap() else {
            panic!("expected chat-message");
        };
        assert!(sub.content.is_none());
    }
}

#[test]
fn typing_signal_round_trips_is_typing_flag() {
    let text = r#"{"event":"typing","data":{"boardId":"b","userId":"u","username":"alice","isTyping":true}}"#;
    let event = ClientEvent::from_text(text).unwrap();
    assert_eq!(event.name(), "typing");
    let ClientEvent::Typing(sig) = event else { panic!("expected typing") };
    assert!(sig.is_typing);
    assert_eq!(sig.username, "alice");
}

#[test]
fn unknown_client_event_is_codec_error() {
    let err = ClientEvent::from_text(r#"{"event":"dance","data":{}}"#).unwrap_err();
    assert!(err.to_string().starts_with("invalid frame"));
}

#[test]
fn garbage_text_is_codec_error() {
    assert!(ClientEvent::from_text("not json").is_err());
}

// =============================================================================
// SERVER EVENTS
// =============================================================================

#[test]
fn chat_message_serializes_author_and_rfc3339_timestamp() {
    let msg = sample_message();
    let value: serde_json::Value =
        serde_json::from_str(&ServerEvent::ChatMessage(msg.clone()).to_text().unwrap()).unwrap();

    assert_eq!(value["event"], "chat-message");
    assert_eq!(value["data"]["content"], "hi");
    assert_eq!(value["data"]["createdAt"], "2024-05-01T12:30:00Z");
    assert_eq!(value["data"]["user"]["username"], "alice");
    assert_eq!(value["data"]["user"]["firstName"], "Alice");
    assert!(value["data"]["user"].get("lastName").is_none());
    assert!(value["data"].get("fileUrl").is_none());
    assert_eq!(value["data"]["boardId"], json!(msg.board_id));
}

#[test]
fn server_event_parses_back_on_client_side() {
    let msg = sample_message();
    let text = ServerEvent::ChatMessage(msg.clone()).to_text().unwrap();
    assert_eq!(ServerEvent::from_text(&text).unwrap(), ServerEvent::ChatMessage(msg));
}

#[test]
fn typing_notice_has_no_board_field() {
    let user_id = Uuid::new_v4();
    let event = ServerEvent::Typing(TypingNotice { user_id, username: "bob".into(), is_typing: false });
    let value: serde_json::Value = serde_json::from_str(&event.to_text().unwrap()).unwrap();
    assert_eq!(value, json!({"event": "typing", "data": {"userId": user_id, "username": "bob", "isTyping": false}}));
}

#[test]
fn error_from_typed_carries_code_and_retryable() {
    #[derive(Debug, thiserror::Error)]
    #[error("storage unavailable")]
    struct Unavailable;

    impl ErrorCode for Unavailable {
        fn error_code(&self) -> &'static str {
            "E_PERSISTENCE"
        }

        fn retryable(&self) -> bool {
            true
        }
    }

    let event = ServerEvent::error(&Unavailable);
    assert_eq!(event.name(), "error");
    let ServerEvent::Error(notice) = event else { panic!("expected error") };
    assert_eq!(notice.message, "storage unavailable");
    assert_eq!(notice.code.as_deref(), Some("E_PERSISTENCE"));
    assert!(notice.retryable);
}

#[test]
fn plain_error_notice_omits_code() {
    let value = serde_json::to_value(ErrorNotice::new("nope")).unwrap();
    assert_eq!(value, json!({"message": "nope", "retryable": false}));
}
