//! Batched search-trend retrieval with cross-batch rescaling.
//!
//! The upstream API normalizes each request to its own strongest series and caps
//! how many groups one request may carry. Groups are therefore fetched in batches
//! that all include one anchor group, and every batch after the first is rescaled
//! against the anchor values of the first so all series share one scale.

pub mod analyzer;
pub mod client;
pub mod config;
pub mod export;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod utils;
