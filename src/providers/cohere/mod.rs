//! Cohere-style protocol family: newline-delimited JSON with typed events.

pub mod streaming;

pub use streaming::CohereAdapter;
