pub mod client;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "loopback"))]
pub mod loopback;
pub mod reporter;

pub use client::ApiClient;
pub use config::Config;
pub use error::ApiError;
pub use reporter::{AsyncReporter, ReportEvent};
