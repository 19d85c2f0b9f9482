pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod geo;
pub mod render;
pub mod schedule;
pub mod spatial;
pub mod types;
