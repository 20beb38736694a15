//! Tests for object key naming.

use vouch_storage::{ObjectKey, thumbnail_file_name};

#[test]
fn test_upload_key_layout() {
    let key = ObjectKey::for_upload("shared/uploads", "morning run.MOV", "video/quicktime", 42);
    assert_eq!(key.as_str(), "shared/uploads/42-morning_run.mov");
    assert_eq!(key.namespace(), Some("shared/uploads"));
    assert_eq!(key.file_name(), "42-morning_run.mov");
}

#[test]
fn test_extension_falls_back_to_mime_type() {
    let key = ObjectKey::for_upload("shared/uploads", "clip", "video/mp4", 7);
    assert!(key.as_str().starts_with("shared/uploads/7-clip."));
    assert!(key.thumbnail_key().is_some());

    let unknown = ObjectKey::for_upload("shared/uploads", "blob", "application/x-unknown-thing", 7);
    assert_eq!(unknown.as_str(), "shared/uploads/7-blob");
    assert_eq!(unknown.thumbnail_key(), None);
}

#[test]
fn test_empty_stem_uses_fallback() {
    let key = ObjectKey::for_upload("shared/uploads/", "", "image/png", 1);
    assert!(key.as_str().starts_with("shared/uploads/1-upload"));
}

#[test]
fn test_thumbnail_key_shares_base() {
    let key = ObjectKey::new("shared/uploads/1700-run.mp4");
    assert_eq!(
        key.thumbnail_key(),
        Some(ObjectKey::new("shared/uploads/1700-run.jpg"))
    );
}

#[test]
fn test_jpeg_has_no_separate_thumbnail() {
    let key = ObjectKey::new("shared/uploads/1700-photo.jpg");
    assert_eq!(key.thumbnail_key(), None);
}

#[test]
fn test_thumbnail_file_name() {
    assert_eq!(thumbnail_file_name("1-a.webm"), "1-a.jpg");
    assert_eq!(thumbnail_file_name("1-a.b.mp4"), "1-a.b.jpg");
}
