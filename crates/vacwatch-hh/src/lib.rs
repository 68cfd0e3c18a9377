//! hh.ru vacancy search for vacwatch.
//!
//! ## Features
//!
//! - **Client**: [`HhClient`] turns a [`vacwatch_store::FilterSet`] into a
//!   `/vacancies` query and normalizes the response into [`JobPosting`]s
//! - **Source seam**: [`JobSource`] is what the polling loop depends on; the
//!   hh.ru implementation never fails, it degrades to an empty batch
//! - **Formatting**: [`format_posting`] renders one vacancy as a chat message

mod client;
mod error;
mod format;
mod types;

pub use client::{
    DEFAULT_API_URL, HhClient, HhConfig, JobSource, MAX_PER_PAGE, REQUEST_TIMEOUT, USER_AGENT,
};
pub use error::HhError;
pub use format::{escape_html, format_posting, format_salary, group_thousands};
pub use types::{JobPosting, SalaryRange};
