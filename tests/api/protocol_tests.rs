//! Wire Protocol Contract Tests
//!
//! Pin down the shapes clients depend on: the response envelope, DTO
//! serialization, payload parsing, and the canonical direct-group key.

use pretty_assertions::assert_eq;
use serde_json::json;
use validator::Validate;

use chatme_server::application::dto::{Envelope, GroupDto, MessageDto, SendMessagePayload};
use chatme_server::domain::{direct_group_name, GroupKind};
use chatme_server::infrastructure::cache::Identity;
use chatme_server::shared::SnowflakeGenerator;

use crate::common::{sample_group, sample_message};

#[test]
fn test_direct_group_name_is_order_independent() {
    assert_eq!(direct_group_name(7, 42), direct_group_name(42, 7));
    assert_eq!(direct_group_name(7, 42), "dm:7:42");
}

#[test]
fn test_envelope_wire_shape() {
    let ok = serde_json::to_value(Envelope::ok("saved", json!({"id": "1"}))).unwrap();
    assert_eq!(ok, json!({"success": true, "message": "saved", "data": {"id": "1"}}));

    // Errors never carry a data field.
    let err = serde_json::to_value(Envelope::error("Not found: Group 9 not found")).unwrap();
    assert_eq!(
        err,
        json!({"success": false, "message": "Not found: Group 9 not found"})
    );
}

#[test]
fn test_message_dto_serializes_ids_as_strings() {
    // Snowflakes overflow JavaScript number precision; the wire form
    // must be strings.
    let message = sample_message(7212838380358406144, 42, 7, "hi");
    let value = serde_json::to_value(MessageDto::from(message)).unwrap();

    assert_eq!(value["id"], "7212838380358406144");
    assert_eq!(value["group_id"], "42");
    assert_eq!(value["sender_id"], "7");
    assert_eq!(value["text"], "hi");
    assert_eq!(value["seen"], false);
}

#[test]
fn test_group_dto_carries_kind_as_string() {
    let group = sample_group(10, "dm:1:2", GroupKind::Direct);
    let value = serde_json::to_value(GroupDto::from(group)).unwrap();
    assert_eq!(value["kind"], "direct");

    let group = sample_group(11, "market-talk", GroupKind::MultiParty);
    let value = serde_json::to_value(GroupDto::from(group)).unwrap();
    assert_eq!(value["kind"], "multi_party");
}

#[test]
fn test_payload_parsing_tolerates_unknown_fields() {
    // Older or newer clients may send extra fields; they are ignored,
    // not rejected.
    let payload: SendMessagePayload = serde_json::from_value(json!({
        "to_user": 42,
        "text": "hi",
        "client_version": "2.3.1"
    }))
    .unwrap();

    assert_eq!(payload.to_user, Some(42));
    assert!(payload.validate().is_ok());
}

#[test]
fn test_payload_validation_rejects_oversized_text() {
    let payload: SendMessagePayload = serde_json::from_value(json!({
        "to_user": 42,
        "text": "x".repeat(4001)
    }))
    .unwrap();

    assert!(payload.validate().is_err());
}

#[test]
fn test_snowflake_ids_increase_monotonically() {
    let generator = SnowflakeGenerator::new(1, 1);
    let mut previous = generator.generate();
    for _ in 0..1000 {
        let next = generator.generate();
        assert!(next > previous, "IDs must define a total message order");
        previous = next;
    }
}

#[test]
fn test_identity_keys_distinguish_anonymous_connections() {
    assert_eq!(Identity::User(42).key(), "42");
    assert_eq!(Identity::Anonymous("203.0.113.9".into()).key(), "anon:203.0.113.9");
    assert!(!Identity::Anonymous("203.0.113.9".into()).is_authenticated());
}
