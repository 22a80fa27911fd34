use super::views::View;
use super::{Action, Page, Session};
use crate::common::errors::ErrorCode;
use crate::config::Config;
use crate::config::test_helpers::{setup_logged_in_session, setup_test_store};
use crate::history::models::HistoryAction;
use crate::samples::models::SampleField;
use std::sync::Arc;
use std::sync::atomic::Ordering;

async fn session_with_editor(name: &str) -> Session {
    let mut session = setup_logged_in_session().await;
    let outcome = session.handle(Action::SetEditor(name.to_string())).await;
    assert!(outcome.notification.is_some_and(|n| !n.is_error()));
    session
}

/// Create a sample through the edit flow and return its id
async fn create_sample(session: &mut Session, batch: &str) -> i32 {
    session.handle(Action::New).await;
    session
        .handle(Action::SetField(SampleField::Batch, Some(batch.to_string())))
        .await;
    let outcome = session.handle(Action::Save).await;
    match outcome.view {
        View::SampleDetail { sample, .. } => sample.id,
        other => panic!("Expected detail view after save, got {other:?}"),
    }
}

#[tokio::test]
async fn test_actions_before_login_are_forbidden() {
    let store = Arc::new(setup_test_store().await);
    let mut session = Session::new(store, Config::for_tests());

    let outcome = session.handle(Action::Home).await;
    assert_eq!(outcome.view, View::Login);
    let notification = outcome.notification.expect("Should carry an error");
    assert_eq!(notification.code, Some(ErrorCode::Forbidden));

    let outcome = session.handle(Action::Login("wrong".to_string())).await;
    assert_eq!(outcome.view, View::Login);
    assert!(!session.state().authenticated);

    let outcome = session.handle(Action::Login("letmein".to_string())).await;
    assert!(matches!(outcome.view, View::SampleList { .. }));
    assert!(session.state().authenticated);
    assert_eq!(session.state().page, Page::Home);
}

#[tokio::test]
async fn test_save_requires_editor() {
    let mut session = setup_logged_in_session().await;
    session.handle(Action::New).await;
    session
        .handle(Action::SetField(SampleField::Batch, Some("B001".to_string())))
        .await;

    let outcome = session.handle(Action::Save).await;
    let notification = outcome.notification.expect("Should carry an error");
    assert_eq!(notification.code, Some(ErrorCode::ValidationError));
    assert!(notification.message.contains("'editor'"));

    // Nothing was written and the draft is still there
    let outcome = session.handle(Action::Home).await;
    let View::SampleList { samples, .. } = outcome.view else {
        panic!("Expected list view");
    };
    assert!(samples.is_empty());
}

#[tokio::test]
async fn test_save_requires_batch() {
    let mut session = session_with_editor("Alice").await;
    session.handle(Action::New).await;
    session
        .handle(Action::SetField(SampleField::Type, Some("wool".to_string())))
        .await;

    let outcome = session.handle(Action::Save).await;
    let notification = outcome.notification.expect("Should carry an error");
    assert_eq!(notification.code, Some(ErrorCode::ValidationError));
    assert!(notification.message.contains("'batch'"));
    assert_eq!(session.state().page, Page::Edit);
    assert!(session.state().current.is_some());
}

#[tokio::test]
async fn test_edit_sends_only_changed_fields() {
    let mut session = session_with_editor("Alice").await;
    let id = create_sample(&mut session, "B001").await;

    session.handle(Action::SetEditor("Bob".to_string())).await;
    session.handle(Action::Edit(Some(id))).await;
    session
        .handle(Action::SetField(
            SampleField::Location,
            Some("Shelf-3".to_string()),
        ))
        .await;
    let outcome = session.handle(Action::Save).await;

    let View::SampleDetail { sample, history } = outcome.view else {
        panic!("Expected detail view");
    };
    assert_eq!(sample.location.as_deref(), Some("Shelf-3"));
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action(), HistoryAction::Update);
    assert_eq!(history[0].editor, "Bob");
    let payload = history[0].change.payload().unwrap();
    let changed: Vec<_> = payload.as_object().unwrap().keys().cloned().collect();
    assert_eq!(changed, vec!["location"]);
}

#[tokio::test]
async fn test_save_without_changes_writes_nothing() {
    let mut session = session_with_editor("Alice").await;
    let id = create_sample(&mut session, "B001").await;

    session.handle(Action::Edit(None)).await;
    let outcome = session.handle(Action::Save).await;

    let View::SampleDetail { history, .. } = outcome.view else {
        panic!("Expected detail view");
    };
    assert_eq!(history.len(), 1);
    assert_eq!(session.state().current.as_ref().and_then(|c| c.id), Some(id));
}

#[tokio::test]
async fn test_images_are_kept_in_draft_until_save() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("front.png");
    let second = dir.path().join("back.jpg");
    std::fs::write(&first, b"png bytes").unwrap();
    std::fs::write(&second, b"jpeg bytes").unwrap();

    let mut session = session_with_editor("Alice").await;
    let id = create_sample(&mut session, "B001").await;

    session.handle(Action::Edit(Some(id))).await;
    session.handle(Action::AttachImage(first)).await;
    let outcome = session.handle(Action::AttachImage(second)).await;
    let View::Edit { images, .. } = outcome.view else {
        panic!("Expected edit view");
    };
    assert_eq!(images.len(), 2);
    assert_eq!(images[1].mime_type, "image/jpeg");

    session.handle(Action::DetachImage(0)).await;

    // Nothing persisted yet
    let store_images = session
        .store
        .get_sample_by_id(id)
        .await
        .unwrap()
        .unwrap()
        .images;
    assert!(store_images.is_empty());

    let outcome = session.handle(Action::Save).await;
    let View::SampleDetail { sample, history } = outcome.view else {
        panic!("Expected detail view");
    };
    assert_eq!(sample.images.len(), 1);
    assert_eq!(sample.images[0].name, "back.jpg");
    let payload = history[0].change.payload().unwrap();
    assert_eq!(payload["images"]["old"], "0 images");
    assert_eq!(payload["images"]["new"], "1 image");
}

#[tokio::test]
async fn test_attach_missing_file_reports_error() {
    let mut session = session_with_editor("Alice").await;
    session.handle(Action::New).await;

    let outcome = session
        .handle(Action::AttachImage("/definitely/not/here.png".into()))
        .await;
    assert_eq!(outcome.view, View::Unchanged);
    assert!(outcome.notification.is_some_and(|n| n.is_error()));

    let outcome = session.handle(Action::DetachImage(3)).await;
    assert!(outcome.notification.is_some_and(|n| n.is_error()));
}

#[tokio::test]
async fn test_delete_clears_current_and_records_history() {
    let mut session = session_with_editor("Alice").await;
    let id = create_sample(&mut session, "B001").await;

    session.handle(Action::Show(id)).await;
    assert_eq!(session.state().page, Page::Detail);

    let outcome = session.handle(Action::Delete(None)).await;
    let View::SampleList { samples, .. } = outcome.view else {
        panic!("Expected list view");
    };
    assert!(samples.is_empty());
    assert!(session.state().current.is_none());

    let outcome = session.handle(Action::History(None)).await;
    let View::History { records, .. } = outcome.view else {
        panic!("Expected history view");
    };
    assert_eq!(records[0].action(), HistoryAction::Delete);
}

#[tokio::test]
async fn test_show_missing_sample_is_not_found() {
    let mut session = setup_logged_in_session().await;
    let outcome = session.handle(Action::Show(99)).await;
    assert_eq!(outcome.view, View::Unchanged);
    assert_eq!(
        outcome.notification.and_then(|n| n.code),
        Some(ErrorCode::ResourceNotFound)
    );
}

#[tokio::test]
async fn test_in_flight_operation_blocks_writes() {
    let mut session = session_with_editor("Alice").await;
    let id = create_sample(&mut session, "B001").await;

    let busy = session.busy_flag();
    busy.store(true, Ordering::SeqCst);
    let outcome = session.handle(Action::Delete(Some(id))).await;
    assert_eq!(
        outcome.notification.and_then(|n| n.code),
        Some(ErrorCode::BusinessRuleViolation)
    );
    assert!(session.store.get_sample_by_id(id).await.unwrap().is_some());

    busy.store(false, Ordering::SeqCst);
    let outcome = session.handle(Action::Delete(Some(id))).await;
    assert!(outcome.notification.is_some_and(|n| !n.is_error()));
    assert!(!busy.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_navigation_clears_current_sample() {
    let mut session = session_with_editor("Alice").await;
    let id = create_sample(&mut session, "B001").await;
    session.handle(Action::Show(id)).await;
    assert!(session.state().current.is_some());

    session.handle(Action::Settings).await;
    assert_eq!(session.state().page, Page::Settings);
    assert!(session.state().current.is_none());

    let outcome = session.handle(Action::SetField(SampleField::Notes, None)).await;
    assert_eq!(
        outcome.notification.and_then(|n| n.code),
        Some(ErrorCode::BusinessRuleViolation)
    );
}

#[tokio::test]
async fn test_export_then_import_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with_editor("Alice").await;
    create_sample(&mut session, "B001").await;
    create_sample(&mut session, "B002").await;

    let outcome = session
        .handle(Action::Export(Some(dir.path().to_path_buf())))
        .await;
    assert!(outcome.notification.is_some_and(|n| !n.is_error()));

    let exported: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(exported.len(), 1);
    let file_name = exported[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("sample-vault-backup_"));

    // Import into a fresh store
    let mut other = session_with_editor("Carol").await;
    let outcome = other.handle(Action::Import(exported[0].clone())).await;
    let View::SampleList { samples, .. } = outcome.view else {
        panic!("Expected list view, got {:?}", outcome.notification);
    };
    assert_eq!(samples.len(), 2);

    let outcome = other.handle(Action::History(Some("carol".to_string()))).await;
    let View::History { records, .. } = outcome.view else {
        panic!("Expected history view");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action(), HistoryAction::Import);
}

#[tokio::test]
async fn test_import_bad_document_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{"samples": []}"#).unwrap();

    let mut session = session_with_editor("Alice").await;
    create_sample(&mut session, "B001").await;

    let outcome = session.handle(Action::Import(path)).await;
    assert_eq!(
        outcome.notification.and_then(|n| n.code),
        Some(ErrorCode::ValidationError)
    );
    assert_eq!(session.store.counts().await.unwrap(), (1, 1));
}

#[tokio::test]
async fn test_settings_summary() {
    let mut session = session_with_editor("Alice").await;
    create_sample(&mut session, "B001").await;

    let outcome = session.handle(Action::Settings).await;
    let View::Settings(summary) = outcome.view else {
        panic!("Expected settings view");
    };
    assert_eq!(summary.sample_count, 1);
    assert_eq!(summary.history_count, 1);
    assert_eq!(summary.schema_version, 1);
    assert_eq!(summary.editor.as_deref(), Some("Alice"));
    assert!(summary.storage_usage > 0);
}

#[tokio::test]
async fn test_views_render_plain_text() {
    let mut session = session_with_editor("Alice").await;
    let id = create_sample(&mut session, "B-render").await;

    let outcome = session.handle(Action::Show(id)).await;
    let rendered = console::strip_ansi_codes(&outcome.view.render()).into_owned();
    assert!(rendered.contains(&format!("Sample #{id}")));
    assert!(rendered.contains("B-render"));
    assert!(rendered.contains("add"));

    let outcome = session.handle(Action::Settings).await;
    let rendered = console::strip_ansi_codes(&outcome.view.render()).into_owned();
    assert!(rendered.contains("schema version  1"));
    assert!(View::Unchanged.render().is_empty());
}
