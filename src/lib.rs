pub mod actions;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod interactive;
pub mod logging;
pub mod models;
pub mod session;
pub mod units;
pub mod views;
