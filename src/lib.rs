//! Durable job queue, dispatcher, and event-driven state tracker for remote
//! build jobs. See the module docs on `store`, `launcher`, `notifier`,
//! `dispatcher`, `recovery`, and `server` for the component breakdown.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod launcher;
pub mod notifier;
pub mod recovery;
pub mod server;
pub mod store;

pub use config::Config;
