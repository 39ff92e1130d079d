pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{FontOccurrence, FontSummaryRow, SystemFontCacheEntry};
pub use sqlite::IndexStore;
