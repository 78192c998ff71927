//! Runtime: the orchestrator and the processes built around it.
//!
//! The orchestrator turns one error line into a diagnosis (memory, template,
//! or model). The consumer feeds it from the log stream, the producer writes
//! demo errors into that stream, and `ping` checks that the store is reachable.

pub mod consumer;
pub mod orchestrator;
pub mod ping;
pub mod producer;
pub mod types;

pub use consumer::Consumer;
pub use orchestrator::Orchestrator;
pub use ping::ping;
pub use producer::{Producer, DEMO_ERRORS};
pub use types::*;
