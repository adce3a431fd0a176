pub mod logging;
pub mod stats;
pub mod urls;
