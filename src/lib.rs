pub mod ai;
pub mod api;
pub mod config;
pub mod error;
pub mod exec;
pub mod hub;
