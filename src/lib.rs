//! Stable records service: horses and their vet visits, vaccines and
//! pregnancies, kept per tenant in SQLite and mirrored to a legacy document
//! store.

pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod import;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod reminders;
pub mod remote;
pub mod repo;
pub mod state;
pub mod stats;
pub mod sync;
pub mod time;
pub mod timeline;
pub mod uploads;

pub use error::{AppError, AppResult};
pub use state::AppState;
