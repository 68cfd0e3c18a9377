//! Background vacancy polling for vacwatch.
//!
//! This crate provides the loop that:
//! - Fetches vacancies for the current filters on a fixed interval
//! - Drops vacancies whose ids are already in the seen registry
//! - Delivers the rest to the configured chat, one message each
//! - Survives failing cycles with a fixed backoff
//! - Starts, stops and cancels cleanly on command

mod dedup;
mod delivery;
mod error;
mod poller;

pub use dedup::filter_new;
pub use delivery::Delivery;
pub use error::{DeliveryError, PollerError};
pub use poller::{
    CycleReport, Poller, PollerState, PollerStats, PollerTiming, SharedFilters, SharedSeen,
    StartOutcome,
};
