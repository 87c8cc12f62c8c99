//! Integration tests module
//!
//! End-to-end scrape sessions against mock imageboards, including:
//! - Seed → fetch → extract → persist pipeline
//! - Cache dump, reload and eviction
//! - Error handling and recovery scenarios

pub mod fixtures;
pub mod pipeline_test;
