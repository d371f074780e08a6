pub mod check;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod index;
pub mod ingest;
pub mod model;
pub mod parsers;
pub mod report;
pub mod source;
pub mod violation;
