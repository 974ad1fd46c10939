//! Browser return worker and the system browser launcher it drives.

pub mod opener;
pub mod worker;

pub use opener::{BrowserOpener, SystemBrowser};
pub use worker::{BrowserReturnWorker, DEFAULT_POLL_INTERVAL};
