//! Common test utilities for integration tests.

pub mod image_utils;
pub mod test_data;
