#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(128);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A cache operation drawn from a small key space so keys repeat.
#[derive(Clone, Debug)]
pub enum CacheOp {
    Add(u8),
    AddIfRoom(u8),
    Get(u8),
    Clear,
}

pub fn arb_op(keys: u8) -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        6 => (0..keys).prop_map(CacheOp::Add),
        3 => (0..keys).prop_map(CacheOp::AddIfRoom),
        3 => (0..keys).prop_map(CacheOp::Get),
        1 => Just(CacheOp::Clear),
    ]
}

pub fn arb_ops(keys: u8, max_len: usize) -> impl Strategy<Value = Vec<CacheOp>> {
    prop::collection::vec(arb_op(keys), 0..max_len)
}
