pub mod api;
pub mod auth;
pub mod collector;
pub mod config;
pub mod debug;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod operations;
pub mod resolver;
pub mod sheets_sink;
pub mod sync;
pub mod tui;
pub mod xlsx_sink;
