//! CLI command handlers, one file per concern.

mod ask;
mod auth;
mod health;
mod report;
mod upload;
mod watch;

pub use ask::run_ask;
pub use auth::{run_login, run_logout, run_register, run_whoami};
pub use health::run_health;
pub use upload::run_upload;
pub use watch::run_watch;
