pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use engine::{CancelHandle, ScanEngine, ScanPhase, ScanRequest, ScanSnapshot, ScanStatus};
pub use error::Error;
pub use matcher::{FontMatch, FontMatcher};
pub use progress::{ProgressReporter, SilentReporter};
pub use storage::IndexStore;
