#![forbid(unsafe_code)]

pub mod analyze;
pub mod cli;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod listing;
pub mod logging;
pub mod pipeline;
pub mod raw_store;
pub mod reconcile;
pub mod report;
pub mod sampling;
pub mod tally;
