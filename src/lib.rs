//! SMS relay: broker events in, SMS out.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod health;
pub mod pipeline;
