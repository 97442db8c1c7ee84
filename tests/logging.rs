use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");

    let (dispatch, guard) = quick_launcher::logging::dispatch(true, Some(path.as_path()));
    assert!(guard.is_some());
    tracing::dispatcher::with_default(&dispatch, || tracing::info!("test"));
    drop(guard);

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("test"));
}

#[test]
#[serial]
fn init_without_file_creates_no_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");

    quick_launcher::logging::init(false, None);
    tracing::info!("test");

    sleep(Duration::from_millis(100));

    assert!(!path.exists(), "log file should not be created");
}

#[test]
#[serial]
fn debug_events_filtered_without_debug() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");

    let (dispatch, guard) = quick_launcher::logging::dispatch(false, Some(path.as_path()));
    tracing::dispatcher::with_default(&dispatch, || {
        tracing::debug!("hidden detail");
        tracing::info!("visible");
    });
    drop(guard);

    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("visible"));
    assert!(!contents.contains("hidden detail"));
}
