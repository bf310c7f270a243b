// tests/common/mod.rs

#![allow(dead_code)]

pub use workdag_test_utils::init_tracing;
