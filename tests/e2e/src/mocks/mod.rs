//! Test data factories


pub use fixtures::{noise_text, BatchConfig, TestDataFactory, TestScenario};
