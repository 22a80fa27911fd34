use super::errors::ErrorCode;
use super::models::{Notification, NotificationLevel};
use crate::{not_found, validation_error};

#[test]
fn test_notification_level_serialization() {
    let json = serde_json::to_string(&NotificationLevel::Success).unwrap();
    assert_eq!(json, r#""success""#);

    let json = serde_json::to_string(&NotificationLevel::Error).unwrap();
    assert_eq!(json, r#""error""#);

    let level: NotificationLevel = serde_json::from_str(r#""warning""#).unwrap();
    assert_eq!(level, NotificationLevel::Warning);
}

#[test]
fn test_notification_from_business_error() {
    let notification = Notification::from(not_found!("Sample", 3));

    assert!(notification.is_error());
    assert_eq!(notification.code, Some(ErrorCode::ResourceNotFound));
    assert_eq!(notification.message, "Sample with id '3' not found");
}

#[test]
fn test_notification_serialization_skips_empty_code() {
    let json = serde_json::to_value(Notification::success("Sample saved")).unwrap();
    assert_eq!(json["level"], "success");
    assert_eq!(json["message"], "Sample saved");
    assert!(json.get("code").is_none());

    let json = serde_json::to_value(Notification::from(validation_error!("batch", "is required")))
        .unwrap();
    assert_eq!(json["code"], "VALIDATION_ERROR");
}
