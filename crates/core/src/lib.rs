//! Core data types for the sentinel monitoring bot.

pub mod address;
pub mod alert;
pub mod chain;
pub mod entry;

pub use address::*;
pub use alert::*;
pub use chain::*;
pub use entry::*;
