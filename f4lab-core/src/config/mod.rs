//! Configuration records
//!
//! Everything here is compile-time configuration: a board pin map and one
//! record per lesson program. Records are plain `const` data derived from a
//! [`BoardPins`], so moving a signal to another pin means overriding one
//! field of the board, not editing each lesson.

pub mod board;
pub mod lessons;

pub use board::*;
pub use lessons::*;
