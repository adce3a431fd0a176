//! Batch web content fetcher and quality-metric analyzer
//!
//! Turns an ordered list of URLs into one analysis record per URL,
//! fetching in contiguous batches with bounded concurrency, retrying
//! transient failures with backoff, and computing a fixed set of
//! content-quality metrics per page.

pub mod cli;
pub mod discovery;
pub mod output;
pub mod pipeline;
pub mod utils;
