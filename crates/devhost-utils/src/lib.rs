//! Leaf utilities for devhost: the privileged command bridge and the file
//! helpers that route writes to system paths through it.

pub mod elevate;
pub mod fs;

pub use elevate::{CommandOutput, CommandRunner, Elevator};
