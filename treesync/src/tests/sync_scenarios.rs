use std::fs;

use pretty_assertions::assert_eq;
use rstest::*;
use treesync_core::event::{Content, Event};

use super::SyncFixture;
use crate::sync::sync_target;

const INVALID_UTF8: &[u8] = b"\x80\x81\x82";

#[test]
fn test_new_file() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("new_file.txt"), "new file").unwrap();

    // When
    fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert_eq!(
        fs::read_to_string(fixture.target.join("new_file.txt")).unwrap(),
        "new file"
    );
}

#[test]
fn test_new_file_written_twice_is_sent_once() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("new_file.txt"), "new file").unwrap();
    fs::write(fixture.source.join("new_file.txt"), "new file2").unwrap();

    // When
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert_eq!(
        fs::read_to_string(fixture.target.join("new_file.txt")).unwrap(),
        "new file2"
    );
    assert_eq!(changeset.len(), 1);
}

#[test]
fn test_new_file_and_delete() {
    // Given
    let fixture = SyncFixture::new();

    // When
    fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "deleted", "is_directory": false, "src_path": "source/new_file.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert!(fixture.synchronized());
}

#[test]
fn test_new_file_in_subfolder() {
    // Given
    let fixture = SyncFixture::new();
    fs::create_dir(fixture.source.join("sub1")).unwrap();
    fs::write(fixture.source.join("sub1/foo.txt"), "sub-file").unwrap();

    // When
    fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "created", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "created", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub1"}"#,
    );

    // Then
    assert_eq!(
        fs::read_to_string(fixture.target.join("sub1/foo.txt")).unwrap(),
        "sub-file"
    );
}

#[test]
fn test_delete_file() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("foo.txt"), "content1").unwrap();
    fs::write(fixture.target.join("foo.txt"), "content1").unwrap();
    fs::remove_file(fixture.source.join("foo.txt")).unwrap();

    // When
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "deleted", "is_directory": false, "src_path": "source/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert!(!fixture.target.join("foo.txt").exists());
    assert_eq!(changeset, vec![Event::deleted("foo.txt", false)]);
}

#[test]
fn test_created_empty_file() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("foo.txt"), "").unwrap();

    // When
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": false, "src_path": "source/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert!(fixture.target.join("foo.txt").exists());
    assert_eq!(
        fs::metadata(fixture.target.join("foo.txt")).unwrap().len(),
        0
    );
    assert_eq!(changeset.len(), 1);
}

#[test]
fn test_init() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("foo.txt"), "c1").unwrap();
    fs::write(fixture.source.join("foo.bin"), INVALID_UTF8).unwrap();
    fs::write(fixture.target.join("stale.txt"), "stale").unwrap();

    // When
    fixture.do_init();

    // Then
    assert_eq!(
        fs::read_to_string(fixture.target.join("foo.txt")).unwrap(),
        "c1"
    );
    assert_eq!(
        fs::read(fixture.target.join("foo.bin")).unwrap(),
        INVALID_UTF8.to_vec()
    );
    assert!(!fixture.target.join("stale.txt").exists());
    assert!(fixture.synchronized());
}

#[test]
fn test_synchronized_no_files() {
    // Given
    let fixture = SyncFixture::new();

    // When
    fixture.do_init();

    // Then
    assert!(fixture.synchronized());
}

#[test]
fn test_synchronized_some_files() {
    // Given
    let fixture = SyncFixture::new();

    // When
    fs::write(fixture.source.join("foo.txt"), "c1").unwrap();

    // Then
    assert!(!fixture.synchronized());
}

#[test]
fn test_delete_folder() {
    // Given
    let fixture = SyncFixture::new();
    fs::create_dir(fixture.source.join("sub1")).unwrap();
    fs::write(fixture.source.join("sub1/foo.txt"), "content1").unwrap();
    fixture.copy_source_to_target();
    fs::remove_dir_all(fixture.source.join("sub1")).unwrap();

    // When
    fixture.apply_events(
        r#"
  {"event_type": "deleted", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "deleted", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert!(fixture.synchronized());
}

#[test]
fn test_delete_folder_and_recreate_it() {
    // Given
    let fixture = SyncFixture::new();
    let build = || {
        fs::create_dir(fixture.source.join("sub1")).unwrap();
        fs::write(fixture.source.join("sub1/foo.txt"), "content1").unwrap();
    };
    build();
    fixture.copy_source_to_target();
    fs::remove_dir_all(fixture.source.join("sub1")).unwrap();
    build();

    // When
    fixture.apply_events(
        r#"
  {"event_type": "deleted", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "deleted", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "created", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "created", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub1"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/sub1/foo.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub1"}"#,
    );

    // Then
    assert!(fixture.synchronized());
}

#[test]
fn test_invalid_text() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("foo.bin"), INVALID_UTF8).unwrap();

    // When
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": false, "src_path": "source/foo.bin"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/foo.bin"}
  {"event_type": "closed", "is_directory": false, "src_path": "source/foo.bin"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert!(fixture.synchronized());
    assert_eq!(
        fs::read(fixture.target.join("foo.bin")).unwrap(),
        INVALID_UTF8.to_vec()
    );
    assert_eq!(
        changeset,
        vec![Event::with_content(
            "foo.bin",
            Content::Binary(INVALID_UTF8.to_vec())
        )]
    );
}

#[test]
fn test_rename_file() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("foo.txt"), "content1").unwrap();
    fixture.copy_source_to_target();
    fs::rename(fixture.source.join("foo.txt"), fixture.source.join("bar.txt")).unwrap();

    // When
    fixture.apply_events(
        r#"
  {"event_type": "moved", "is_directory": false, "src_path": "source/foo.txt", "dest_path": "source/bar.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert!(!fixture.target.join("foo.txt").exists());
    assert_eq!(
        fs::read_to_string(fixture.target.join("bar.txt")).unwrap(),
        "content1"
    );
}

#[rstest]
#[case::rename_folder(
    "sub2",
    r#"
  {"event_type": "moved", "is_directory": true, "src_path": "source/sub1", "dest_path": "source/sub2"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "moved", "is_directory": false, "src_path": "source/sub1/foo.txt", "dest_path": "source/sub2/foo.txt"}"#
)]
#[case::move_folder_in_subfolder(
    "sub2/sub1",
    r#"
  {"event_type": "moved", "is_directory": true, "src_path": "source/sub1", "dest_path": "source/sub2/sub1"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/sub2"}
  {"event_type": "moved", "is_directory": false, "src_path": "source/sub1/foo.txt", "dest_path": "source/sub2/sub1/foo.txt"}"#
)]
fn test_move_folder_with_synthetic_child_move(#[case] dest: &str, #[case] raw_events: &str) {
    // Given
    let fixture = SyncFixture::new();
    fs::create_dir(fixture.source.join("sub1")).unwrap();
    fs::write(fixture.source.join("sub1/foo.txt"), "content1").unwrap();
    if dest.starts_with("sub2/") {
        fs::create_dir(fixture.source.join("sub2")).unwrap();
    }
    fixture.copy_source_to_target();
    fs::rename(fixture.source.join("sub1"), fixture.source.join(dest)).unwrap();

    // When
    let changeset = fixture.apply_events(raw_events);

    // Then
    assert!(fixture.synchronized());
    assert_eq!(changeset, vec![Event::moved("sub1", dest, true)]);
}

#[test]
fn test_missing_create_folder_event_is_reordered() {
    // Given
    let fixture = SyncFixture::new();
    fs::create_dir(fixture.source.join("remote")).unwrap();
    fs::write(fixture.source.join("readme.txt"), "readme content").unwrap();
    fs::write(fixture.source.join("remote/__init__.py"), "# init file").unwrap();
    fs::write(fixture.source.join("remote/component1.py"), "# component code").unwrap();

    // When
    fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": false, "src_path": "source/readme.txt"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/readme.txt"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/readme.txt"}
  {"event_type": "created", "is_directory": false, "src_path": "source/remote/__init__.py"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/remote"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/remote/__init__.py"}
  {"event_type": "created", "is_directory": false, "src_path": "source/remote/component1.py"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/remote"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/remote/component1.py"}
  {"event_type": "created", "is_directory": true, "src_path": "source/remote"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}
  {"event_type": "modified", "is_directory": true, "src_path": "source/remote"}
  {"event_type": "modified", "is_directory": true, "src_path": "source"}"#,
    );

    // Then
    assert_eq!(
        fs::read_to_string(fixture.target.join("readme.txt")).unwrap(),
        "readme content"
    );
    assert_eq!(
        fs::read_to_string(fixture.target.join("remote/__init__.py")).unwrap(),
        "# init file"
    );
    assert_eq!(
        fs::read_to_string(fixture.target.join("remote/component1.py")).unwrap(),
        "# component code"
    );
    assert!(fixture.synchronized());
}

#[test]
fn test_blacklisted_paths_are_not_transported() {
    // Given
    let fixture = SyncFixture::new();
    fs::create_dir(fixture.source.join("__pycache__")).unwrap();
    fs::write(fixture.source.join("__pycache__/x.pyc"), "compiled").unwrap();
    fs::write(fixture.source.join("x.py"), "code").unwrap();

    // When
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": true, "src_path": "source/__pycache__"}
  {"event_type": "created", "is_directory": false, "src_path": "source/__pycache__/x.pyc"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/__pycache__/x.pyc"}
  {"event_type": "created", "is_directory": false, "src_path": "source/x.py~"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/x.py~"}
  {"event_type": "moved", "is_directory": false, "src_path": "source/x.py~", "dest_path": "source/x.py"}"#,
    );

    // Then
    assert_eq!(
        changeset,
        vec![Event::with_content("x.py", Content::Text("code".to_string()))]
    );
    assert!(!fixture.target.join("__pycache__").exists());
    assert!(fixture.synchronized());
}

#[test]
fn test_replaying_a_changeset_is_harmless() {
    // Given
    let fixture = SyncFixture::new();
    fs::create_dir(fixture.source.join("sub1")).unwrap();
    fs::write(fixture.source.join("sub1/foo.txt"), "content1").unwrap();
    fixture.copy_source_to_target();
    fs::rename(fixture.source.join("sub1"), fixture.source.join("sub2")).unwrap();
    fs::create_dir(fixture.source.join("new")).unwrap();
    fs::write(fixture.source.join("new/bar.txt"), "bar").unwrap();
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "moved", "is_directory": true, "src_path": "source/sub1", "dest_path": "source/sub2"}
  {"event_type": "created", "is_directory": true, "src_path": "source/new"}
  {"event_type": "created", "is_directory": false, "src_path": "source/new/bar.txt"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/new/bar.txt"}"#,
    );

    // When
    sync_target(&fixture.target, &changeset).unwrap();

    // Then
    assert!(fixture.synchronized());
}

#[test]
fn test_create_rename_then_write() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("b.txt"), "hello").unwrap();

    // When
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "created", "is_directory": false, "src_path": "source/a.txt"}
  {"event_type": "moved", "is_directory": false, "src_path": "source/a.txt", "dest_path": "source/b.txt"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/b.txt"}"#,
    );

    // Then
    assert!(fixture.synchronized());
    assert_eq!(
        changeset,
        vec![
            Event::with_content("a.txt", Content::Text("hello".to_string())),
            Event::moved("a.txt", "b.txt", false),
            Event::with_content("b.txt", Content::Text("hello".to_string())),
        ]
    );
}

#[test]
fn test_replaying_a_backup_on_save_changeset_is_harmless() {
    // Given
    let fixture = SyncFixture::new();
    fs::write(fixture.source.join("f.txt"), "old").unwrap();
    fixture.copy_source_to_target();
    fs::rename(fixture.source.join("f.txt"), fixture.source.join("f.txt.bak")).unwrap();
    fs::write(fixture.source.join("f.txt"), "new").unwrap();
    let changeset = fixture.apply_events(
        r#"
  {"event_type": "moved", "is_directory": false, "src_path": "source/f.txt", "dest_path": "source/f.txt.bak"}
  {"event_type": "created", "is_directory": false, "src_path": "source/f.txt"}
  {"event_type": "modified", "is_directory": false, "src_path": "source/f.txt"}"#,
    );
    assert!(fixture.synchronized());

    // When
    sync_target(&fixture.target, &changeset).unwrap();

    // Then
    assert!(fixture.synchronized());
    assert_eq!(
        fs::read_to_string(fixture.target.join("f.txt.bak")).unwrap(),
        "old"
    );
}
