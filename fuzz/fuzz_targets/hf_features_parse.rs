//! Fuzz target for Hugging Face feature schemas and label discovery.
//!
//! Label discovery must terminate and never panic on any JSON shape.
//!
//! Run with:
//!   cargo +nightly fuzz run hf_features_parse

#![no_main]

use datalens::hub::features::{discover_labels, Feature};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let _ = discover_labels(&value);
    let _ = Feature::parse(&value).label_names();
});
