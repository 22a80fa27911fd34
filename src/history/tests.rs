use super::models::{Change, HistoryAction, HistoryRecord, ImportCounts};
use crate::common::errors::BusinessError;
use crate::samples::models::{FieldDiff, Sample};
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::BTreeMap;

fn snapshot() -> Sample {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    Sample {
        id: 3,
        batch: Some("B003".to_string()),
        r#type: Some("alpaca".to_string()),
        track: None,
        location: None,
        name: None,
        description: None,
        notes: Some("grey lot".to_string()),
        properties: BTreeMap::new(),
        images: Vec::new(),
        create_time: created,
        update_time: created,
    }
}

fn record(sample_id: Option<i32>, editor: &str, change: Change) -> HistoryRecord {
    HistoryRecord {
        id: 11,
        sample_id,
        editor: editor.to_string(),
        time: Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap(),
        change,
    }
}

#[test]
fn test_delete_entry_wire_shape() {
    let entry = record(Some(3), "Bob", Change::Delete(snapshot()));
    let value = serde_json::to_value(&entry).unwrap();

    assert_eq!(value["id"], 11);
    assert_eq!(value["sampleId"], 3);
    assert_eq!(value["action"], "delete");
    assert_eq!(value["editor"], "Bob");
    assert_eq!(value["changes"]["deletedSample"]["batch"], "B003");

    let back: HistoryRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, entry);
}

#[test]
fn test_import_entry_has_no_sample_id() {
    let counts = ImportCounts {
        imported_samples: 4,
        imported_history: 9,
        import_date: Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap(),
    };
    let entry = record(None, "Carol", Change::Import(counts));
    let value = serde_json::to_value(&entry).unwrap();

    assert!(value.get("sampleId").is_none());
    assert_eq!(value["action"], "import");
    assert_eq!(value["changes"]["importedSamples"], 4);
    assert_eq!(value["changes"]["importedHistory"], 9);
    assert!(entry.validate().is_ok());
}

#[test]
fn test_update_payload_is_field_map() {
    let mut diffs = BTreeMap::new();
    diffs.insert(
        "location".to_string(),
        FieldDiff {
            old: json!(null),
            new: json!("Shelf-3"),
        },
    );
    let change = Change::Update(diffs);

    let payload = change.payload().unwrap();
    assert_eq!(payload, json!({"location": {"old": null, "new": "Shelf-3"}}));
    assert_eq!(
        Change::from_parts(HistoryAction::Update, payload).unwrap(),
        change
    );
}

#[test]
fn test_from_parts_rejects_mismatched_payload() {
    assert!(Change::from_parts(HistoryAction::Delete, json!({"batch": "B1"})).is_err());
    assert!(Change::from_parts(HistoryAction::Import, json!([])).is_err());

    let row = json!({
        "id": 1,
        "sampleId": 1,
        "action": "add",
        "editor": "Alice",
        "time": "2024-01-01T00:00:00Z",
        "changes": 42
    });
    assert!(serde_json::from_value::<HistoryRecord>(row).is_err());
}

#[test]
fn test_validate_requires_editor_and_consistent_sample_id() {
    assert!(record(Some(3), "Alice", Change::Add(snapshot())).validate().is_ok());

    let err = record(Some(3), " ", Change::Add(snapshot()))
        .validate()
        .unwrap_err();
    assert!(matches!(err, BusinessError::ValidationError { .. }));

    assert!(record(None, "Alice", Change::Add(snapshot())).validate().is_err());
}

#[test]
fn test_matches_editor_and_payload() {
    let entry = record(Some(3), "Alice", Change::Add(snapshot()));
    assert!(entry.matches("alice"));
    assert!(entry.matches("grey lot"));
    assert!(entry.matches("alpaca"));
    assert!(!entry.matches("bob"));
}

#[test]
fn test_action_display() {
    assert_eq!(HistoryAction::Add.to_string(), "add");
    assert_eq!(HistoryAction::Import.to_string(), "import");
}
