pub mod analyzer;
pub mod extractor;
pub mod fetcher;
pub mod retry;
pub mod scheduler;
pub mod task;
