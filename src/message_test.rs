use super::*;
use crate::geometry::{Direction, ScreenGeometry};
use serde_json::json;

fn tile(id: &str) -> DeviceId {
    DeviceId::new(id)
}

fn cells_round_trip(cells: Vec<bool>) {
    let msg = Message::Cells { sender_id: tile("a"), cells_list: cells.clone() };
    let text = msg.encode().unwrap();
    match Message::decode(&text).unwrap() {
        Message::Cells { cells_list, .. } => assert_eq!(cells_list, cells),
        other => panic!("expected cells, got {other:?}"),
    }
}

// =============================================================================
// cells payload
// =============================================================================

#[test]
fn cells_empty_list_survives() {
    cells_round_trip(Vec::new());
}

#[test]
fn cells_single_value_survives() {
    cells_round_trip(vec![true]);
}

#[test]
fn cells_longest_border_survives() {
    // A 4K portrait screen at the default cell size has fewer than 4096 rows.
    let cells = (0..4096).map(|i| i % 3 == 0 || i % 7 == 0).collect::<Vec<_>>();
    cells_round_trip(cells);
}

#[test]
fn cells_use_camel_case_fields() {
    let msg = Message::Cells { sender_id: tile("a"), cells_list: vec![true, false] };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value, json!({"type": "cells", "senderId": "a", "cellsList": [true, false]}));
}

// =============================================================================
// decode
// =============================================================================

#[test]
fn decode_every_kind() {
    let texts = [
        (r#"{"type":"close","senderId":"b"}"#, "close"),
        (r#"{"type":"start","senderId":"b"}"#, "start"),
        (r#"{"type":"pause","senderId":"b"}"#, "pause"),
        (r#"{"type":"reset","senderId":"b","nonce":9}"#, "reset"),
        (r#"{"type":"ready","senderId":"b"}"#, "ready"),
        (r#"{"type":"cells","senderId":"b","cellsList":[]}"#, "cells"),
    ];
    for (text, kind) in texts {
        let msg = Message::decode(text).unwrap();
        assert_eq!(msg.kind(), kind);
        assert_eq!(msg.sender(), &tile("b"));
    }
}

#[test]
fn decode_pinch_reads_flat_geometry() {
    let text = json!({
        "type": "pinch",
        "direction": "LEFT",
        "x": 3.0,
        "y": 120.5,
        "timestamp": 1_700_000_000_123_i64,
        "screenWidth": 2.5,
        "screenHeight": 4.75,
        "dpiX": 320.0,
        "dpiY": 318.0,
        "senderId": "tile-b"
    })
    .to_string();

    let Message::Pinch(sample) = Message::decode(&text).unwrap() else {
        panic!("expected pinch");
    };
    assert_eq!(sample.direction, Direction::Left);
    assert_eq!(sample.timestamp_ms, 1_700_000_000_123);
    assert_eq!(sample.screen, ScreenGeometry { width_inches: 2.5, height_inches: 4.75, dpi_x: 320.0, dpi_y: 318.0 });
    assert_eq!(sample.originator, tile("tile-b"));
}

#[test]
fn reset_without_nonce_defaults_to_zero() {
    let msg = Message::decode(r#"{"type":"reset","senderId":"b"}"#).unwrap();
    assert_eq!(msg, Message::Reset { sender_id: tile("b"), nonce: 0 });
}

#[test]
fn unknown_type_is_distinguished() {
    let err = Message::decode(r#"{"type":"tilt","senderId":"b"}"#).unwrap_err();
    assert!(matches!(err, MessageError::UnknownType(kind) if kind == "tilt"));
}

#[test]
fn missing_type_is_reported() {
    let err = Message::decode(r#"{"senderId":"b"}"#).unwrap_err();
    assert!(matches!(err, MessageError::MissingType));

    let err = Message::decode(r#"{"type":7}"#).unwrap_err();
    assert!(matches!(err, MessageError::MissingType));
}

#[test]
fn garbage_is_malformed() {
    assert!(matches!(Message::decode("not json").unwrap_err(), MessageError::Malformed(_)));
    // Known kind, wrong shape.
    let err = Message::decode(r#"{"type":"cells","senderId":"b","cellsList":"yes"}"#).unwrap_err();
    assert!(matches!(err, MessageError::Malformed(_)));
}

#[test]
fn non_finite_pinch_is_refused_on_encode() {
    let screen = ScreenGeometry::from_pixels(200.0, 200.0, 100.0);
    let sample = GestureSample { direction: Direction::Left, x: f64::NAN, y: 10.0, timestamp_ms: 0, screen, originator: tile("b") };
    let err = Message::Pinch(sample.clone()).encode().unwrap_err();
    assert!(matches!(err, MessageError::NonFinite("x")));

    let sample = GestureSample { x: 5.0, y: f64::INFINITY, ..sample };
    assert!(matches!(Message::Pinch(sample).encode().unwrap_err(), MessageError::NonFinite("y")));
}

#[test]
fn every_known_kind_has_a_variant() {
    let samples = [
        Message::Close { sender_id: tile("x") },
        Message::Start { sender_id: tile("x") },
        Message::Pause { sender_id: tile("x") },
        Message::Reset { sender_id: tile("x"), nonce: 1 },
        Message::Cells { sender_id: tile("x"), cells_list: vec![] },
        Message::Ready { sender_id: tile("x") },
    ];
    for msg in &samples {
        assert!(KNOWN_KINDS.contains(&msg.kind()));
    }
    assert!(KNOWN_KINDS.contains(&"pinch"));
}
