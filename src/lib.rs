//! Rule-based mailbox auto-responder.
//!
//! Scans configured mailboxes for messages matching declarative search
//! rules, sends a templated reply for each match, then marks the source
//! message so it is not answered twice. Everything happens in one
//! synchronous linear pass per invocation; a hung protocol call blocks the
//! run, and callers needing bounded latency must wrap the transport with a
//! deadline.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod reply;
pub mod rules;
pub mod run;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use run::{RunSummary, run};
