// Library surface for the binary and for headless/integration tests.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod quote;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod story;
pub mod text;
pub mod ui;

pub use error::{Error, FetchError, Result};
