//! File system operations with transaction support.
//!
//! Provides all-or-nothing manifest writes that can be committed
//! or rolled back as a unit.

pub mod transaction;

pub use transaction::Transaction;
