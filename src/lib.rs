pub mod app;
pub mod config;
pub mod error;
pub mod foods;
pub mod state;
