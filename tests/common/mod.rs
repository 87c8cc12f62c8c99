//! Common test utilities

#![allow(dead_code)]

use std::fs;

/// Test fixture paths
pub const FIXTURES_DIR: &str = "tests/fixtures/html";

/// Op post of the sample thread
pub const SAMPLE_OP_ID: &str = "55021750";

pub fn load_fixture(filename: &str) -> String {
    let path = format!("{FIXTURES_DIR}/{filename}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Sample 4chan thread: one op with an image, a text reply and an image reply
pub fn sample_thread() -> String {
    load_fixture("4chan_thread.html")
}
