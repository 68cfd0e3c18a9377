//! Persistent state for vacwatch.
//!
//! Two small JSON-backed stores live here:
//! - [`FilterStore`]: the search filters, polling interval, destination chat
//!   and the `enabled` flag that says whether polling should be running
//! - [`SeenRegistry`]: identifiers of vacancies that were already delivered
//!
//! Neither store ever fails to load. Missing or corrupt files degrade to
//! defaults (filters) or an empty set (registry), and write failures are
//! logged while the in-memory state stays authoritative.

mod error;
mod filters;
mod persist;
mod seen;

pub use error::StoreError;
pub use filters::{
    AREAS, DEFAULT_INTERVAL_MINUTES, Experience, FilterField, FilterSet, FilterStore,
    FilterUpdate, MIN_INTERVAL_MINUTES, MIN_POSITION_CHARS, area_name, validate_area,
    validate_interval, validate_position,
};
pub use seen::SeenRegistry;
