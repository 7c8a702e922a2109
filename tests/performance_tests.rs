use assert_cmd::cargo_bin;
use std::process::Command;

mod common;

#[test]
fn test_large_file_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("large_test.csv");
    common::generate_large_csv(&input_path, 8).expect("Failed to generate large CSV");

    let status = Command::new(cargo_bin!("agentrep"))
        .arg(&input_path)
        .status()
        .expect("Failed to execute command");
    assert!(status.success(), "Binary failed to process 8MB file");
}
