pub mod anniversary;
pub mod app;
pub mod attendance;
pub mod cache;
pub mod config;
pub mod history;
pub mod loader;
pub mod messaging;
pub mod models;
pub mod search;
pub mod setlist;
pub mod stats;

/// Application name for XDG paths
pub const APP_NAME: &str = "encore";

/// Version stamped into the cache; a different stamp wipes it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
