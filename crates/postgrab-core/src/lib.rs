//! Orchestration core for a post-retrieval bot.
//!
//! Given references to posts in a messaging service, fetch their media through a
//! user session and deliver it to whoever asked. The messaging client and the
//! requester side live behind ports ([`ports::MessageSource`], [`ports::Requester`])
//! implemented in adapter crates.

pub mod batch;
pub mod bulk;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod domain;
pub mod download;
pub mod errors;
pub mod fetcher;
pub mod history;
pub mod logging;
pub mod media_group;
pub mod ports;
pub mod progress;
pub mod range;
pub mod reference;
pub mod registry;
pub mod size_gate;
pub mod throttled;
pub mod topic;
pub mod transient;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
