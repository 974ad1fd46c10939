//! Local SQLite persistence for captured feedback.

pub mod connection;
pub mod helpers;
pub mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use models::FeedbackRecord;
pub use repositories::{FeedbackRepository, RECENT_FEEDBACK_LIMIT};
