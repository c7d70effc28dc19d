pub mod admin;
pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod maintenance;
pub mod models;
pub mod notify;
pub mod query;
pub mod report;
pub mod rest;
pub mod settings;
pub mod sql;
pub mod state;
pub mod storage;
pub mod store;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use query::{Adapter, Query};
pub use state::AppState;
