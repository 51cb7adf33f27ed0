//! Core type definitions shared by the adapters and their consumers.

mod common;
mod message;

pub use common::*;
pub use message::*;
