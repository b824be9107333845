//! Datagram decoding and field validation.
//!
//! Decoding is split in two stages. A payload that is not a UTF-8 JSON object
//! is a [`DecodeError`]. A JSON object whose required fields cannot be coerced
//! to their numeric types is a [`ValidationError`] and is rejected whole, so no
//! partial update ever reaches the track store.

use serde_json::{Map, Value};

use super::{ENTITY_STATE_MSG_TYPE, EntityId, EntityState, normalize_heading};

/// Payload could not be turned into a JSON object.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Payload is not a JSON object")]
    NotAnObject,
}

/// JSON object parsed but does not describe a usable `EntityState`.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Field '{field}' is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("Field '{field}' is out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// Either stage of decoding failed.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Accepted `EntityState` together with the object it was decoded from.
///
/// The raw object is what the capture recorder persists, so unknown fields
/// survive a record/replay cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub state: EntityState,
    pub raw: Map<String, Value>,
}

/// Outcome of decoding one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A validated `EntityState`.
    Entity(InboundMessage),
    /// A well-formed message of another kind; silently skipped.
    Ignored { msg_type: Option<String> },
}

/// Decodes a raw datagram payload.
///
/// # Errors
///
/// - `CodecError::Decode` - If the payload is not a UTF-8 JSON object
/// - `CodecError::Validation` - If required fields are missing or not numeric
pub fn decode_datagram(payload: &[u8]) -> Result<Decoded, CodecError> {
    let object = parse_object(payload)?;
    Ok(interpret_object(object)?)
}

/// Parses a payload into a JSON object without interpreting its fields.
///
/// # Errors
///
/// - `DecodeError::InvalidUtf8` - If the payload is not UTF-8
/// - `DecodeError::InvalidJson` - If the text is not JSON
/// - `DecodeError::NotAnObject` - If the JSON value is not an object
pub fn parse_object(payload: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    match serde_json::from_str::<Value>(text)? {
        Value::Object(object) => Ok(object),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Validates a decoded JSON object as an `EntityState`.
///
/// Objects whose `msg_type` is anything other than `"EntityState"` are
/// reported as [`Decoded::Ignored`]. Optional string fields that are absent,
/// null or not strings become `None`.
///
/// # Errors
///
/// - `ValidationError::MissingField` - If `entity_id` or a numeric field is absent
/// - `ValidationError::NotNumeric` - If a numeric field cannot be coerced
/// - `ValidationError::OutOfRange` - If `speed` is negative or `entity_id` is not a non-negative integer
pub fn interpret_object(object: Map<String, Value>) -> Result<Decoded, ValidationError> {
    let msg_type = object.get("msg_type").and_then(Value::as_str);
    if msg_type != Some(ENTITY_STATE_MSG_TYPE) {
        return Ok(Decoded::Ignored {
            msg_type: msg_type.map(str::to_string),
        });
    }

    let entity_id = coerce_entity_id(&object)?;
    let x = coerce_f64(&object, "x")?;
    let y = coerce_f64(&object, "y")?;
    let heading_deg = coerce_f64(&object, "heading_deg")?;
    let speed = coerce_f64(&object, "speed")?;
    let seq = coerce_i64(&object, "seq")?;

    if speed < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: "speed",
            value: speed.to_string(),
        });
    }

    let state = EntityState {
        msg_type: ENTITY_STATE_MSG_TYPE.to_string(),
        entity_id,
        entity_type: optional_string(&object, "entity_type"),
        x,
        y,
        heading_deg: normalize_heading(heading_deg),
        speed,
        status: optional_string(&object, "status"),
        seq,
        timestamp_utc: optional_string(&object, "timestamp_utc"),
    };

    Ok(Decoded::Entity(InboundMessage { state, raw: object }))
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(value) => Ok(value),
    }
}

fn not_numeric(field: &'static str, value: &Value) -> ValidationError {
    ValidationError::NotNumeric {
        field,
        value: value.to_string(),
    }
}

/// Numbers pass through; numeric strings are parsed. Non-finite values fail.
fn coerce_f64(object: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    let value = required(object, field)?;
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| not_numeric(field, value))
}

/// Integers pass through, floats truncate toward zero, strings must hold an integer.
fn coerce_i64(object: &Map<String, Value>, field: &'static str) -> Result<i64, ValidationError> {
    let value = required(object, field)?;
    let parsed = match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
                .map(|v| v.trunc() as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| not_numeric(field, value))
}

fn coerce_entity_id(object: &Map<String, Value>) -> Result<EntityId, ValidationError> {
    let value = required(object, "entity_id")?;
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.map(EntityId).ok_or_else(|| ValidationError::OutOfRange {
        field: "entity_id",
        value: value.to_string(),
    })
}

fn optional_string(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entity(value: Value) -> InboundMessage {
        let bytes = serde_json::to_vec(&value).unwrap();
        match decode_datagram(&bytes).unwrap() {
            Decoded::Entity(message) => message,
            other => panic!("expected entity, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_valid_entity_state() {
        let message = entity(json!({
            "msg_type": "EntityState",
            "entity_id": 42,
            "entity_type": "CONTACT",
            "x": 10,
            "y": 10.5,
            "heading_deg": 0,
            "speed": 0,
            "status": "OK",
            "seq": 1,
            "timestamp_utc": "2024-01-01T00:00:00+00:00"
        }));

        assert_eq!(message.state.entity_id, EntityId::new(42));
        assert_eq!(message.state.x, 10.0);
        assert_eq!(message.state.y, 10.5);
        assert_eq!(message.state.status.as_deref(), Some("OK"));
        assert_eq!(message.state.seq, 1);
        assert_eq!(message.raw["entity_type"], "CONTACT");
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let message = entity(json!({
            "msg_type": "EntityState",
            "entity_id": "7",
            "x": "1.5", "y": " 2 ", "heading_deg": "-90", "speed": "3", "seq": "12"
        }));

        assert_eq!(message.state.entity_id, EntityId::new(7));
        assert_eq!(message.state.x, 1.5);
        assert_eq!(message.state.y, 2.0);
        assert_eq!(message.state.heading_deg, 270.0);
        assert_eq!(message.state.seq, 12);
    }

    #[test]
    fn test_heading_normalized_on_receive() {
        let message = entity(json!({
            "msg_type": "EntityState", "entity_id": 1,
            "x": 0, "y": 0, "heading_deg": 725.0, "speed": 1, "seq": 3
        }));
        assert_eq!(message.state.heading_deg, 5.0);
    }

    #[test]
    fn test_float_seq_truncates() {
        let message = entity(json!({
            "msg_type": "EntityState", "entity_id": 1,
            "x": 0, "y": 0, "heading_deg": 0, "speed": 1, "seq": 5.9
        }));
        assert_eq!(message.state.seq, 5);
    }

    #[test]
    fn test_malformed_payloads_are_decode_errors() {
        assert!(matches!(
            decode_datagram(&[0xff, 0xfe, 0x00]),
            Err(CodecError::Decode(DecodeError::InvalidUtf8(_)))
        ));
        assert!(matches!(
            decode_datagram(b"{not json"),
            Err(CodecError::Decode(DecodeError::InvalidJson(_)))
        ));
        assert!(matches!(
            decode_datagram(b"[1, 2, 3]"),
            Err(CodecError::Decode(DecodeError::NotAnObject))
        ));
    }

    #[test]
    fn test_non_numeric_field_rejects_whole_message() {
        let bytes = serde_json::to_vec(&json!({
            "msg_type": "EntityState", "entity_id": 1,
            "x": "left", "y": 0, "heading_deg": 0, "speed": 1, "seq": 1
        }))
        .unwrap();

        match decode_datagram(&bytes) {
            Err(CodecError::Validation(ValidationError::NotNumeric { field, .. })) => {
                assert_eq!(field, "x");
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_fields_are_validation_errors() {
        let missing_id = json!({
            "msg_type": "EntityState",
            "x": 0, "y": 0, "heading_deg": 0, "speed": 1, "seq": 1
        });
        let null_seq = json!({
            "msg_type": "EntityState", "entity_id": 3,
            "x": 0, "y": 0, "heading_deg": 0, "speed": 1, "seq": null
        });

        assert_eq!(
            interpret_object(missing_id.as_object().unwrap().clone()),
            Err(ValidationError::MissingField { field: "entity_id" })
        );
        assert_eq!(
            interpret_object(null_seq.as_object().unwrap().clone()),
            Err(ValidationError::MissingField { field: "seq" })
        );
    }

    #[test]
    fn test_negative_speed_rejected() {
        let object = json!({
            "msg_type": "EntityState", "entity_id": 3,
            "x": 0, "y": 0, "heading_deg": 0, "speed": -1, "seq": 1
        });
        assert!(matches!(
            interpret_object(object.as_object().unwrap().clone()),
            Err(ValidationError::OutOfRange { field: "speed", .. })
        ));
    }

    #[test]
    fn test_other_message_types_are_ignored() {
        let decoded = decode_datagram(br#"{"msg_type": "Heartbeat", "seq": 1}"#).unwrap();
        assert_eq!(
            decoded,
            Decoded::Ignored {
                msg_type: Some("Heartbeat".to_string())
            }
        );

        let untyped = decode_datagram(br#"{"entity_id": 1}"#).unwrap();
        assert_eq!(untyped, Decoded::Ignored { msg_type: None });
    }
}
