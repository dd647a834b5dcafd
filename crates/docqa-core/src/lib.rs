pub mod config;
pub mod logging;

pub mod api;
pub mod context;
pub mod monitor;
mod observers;
pub mod retry;
pub mod session;

pub use observers::Subscription;
