//! Classification and dispatch pipeline.
//!
//! Every broker delivery flows through:
//! 1. `types::decode()`: raw bytes to a JSON object
//! 2. `EventClassifier::classify()`: recipient + body, or a terminal failure
//! 3. `Dispatcher::dispatch()`: phone normalization, then gateway or simulation
//!
//! No stage keeps state between messages.

pub mod classifier;
pub mod dispatcher;
pub mod phone;
pub mod types;

pub use classifier::EventClassifier;
pub use dispatcher::Dispatcher;
pub use types::{ClassificationFailure, DecodedEvent, DispatchIntent, DispatchOutcome, RawEvent};
