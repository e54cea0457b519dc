//! Command implementations that do more than drive the store.

pub mod init;
