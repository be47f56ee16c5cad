/// Application settings loaded from `tracker.toml`
pub mod app;

/// Database configuration and connection management
pub mod database;
