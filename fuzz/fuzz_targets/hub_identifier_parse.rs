//! Fuzz target for hub identifier parsing.
//!
//! Anything that parses must print back to itself.
//!
//! Run with:
//!   cargo +nightly fuzz run hub_identifier_parse

#![no_main]

use datalens::hub::HubIdentifier;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(identifier) = HubIdentifier::parse(text) {
        assert_eq!(identifier.to_string(), text);
    }
});
