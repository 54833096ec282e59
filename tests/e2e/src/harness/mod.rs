//! Test harness: isolated stores and failure injection

mod faulty_store;
mod store_manager;

pub use faulty_store::{FaultyStore, StoreOp};
pub use store_manager::TestStoreManager;
