//! Alignment upstream client and variant calling.
//!
//! [`BlastClient`] drives the aligner's URL API (submit a query, poll until
//! the search finishes, fetch the JSON report) and turns the report into a
//! [`varpipe_core::AlignmentResult`]. [`caller::call_variants`] then walks
//! the best hit's aligned strings and emits positioned variant records.
//! The alignment computation itself is entirely the upstream's business.

pub mod caller;
pub mod client;
pub mod error;
pub mod report;

pub use caller::call_variants;
pub use client::{AlignConfig, Aligner, BlastClient};
pub use error::{AlignError, AlignResult};
