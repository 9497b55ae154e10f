pub mod ai;
pub mod api;
pub mod config;
pub mod digest;
pub mod error;
pub mod geo;
pub mod news;
pub mod retry;
pub mod scheduler;
pub mod storage;

pub use config::AppConfig;
pub use digest::{DigestReport, DigestService, DigestTarget};
pub use error::{Error, Result};
