pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod matching;
pub mod models;
pub mod odds;
pub mod report;
pub mod snapshot;
pub mod workers;
