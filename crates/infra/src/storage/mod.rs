//! Token store backends that live outside the auth core

pub mod file_store;

pub use file_store::FileTokenStore;
