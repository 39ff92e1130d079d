use crate::scanner::FileKind;
use serde::Serialize;

/// One font reference found in one template file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontOccurrence {
    pub font_name: String,
    pub file_path: String,
    pub file_type: FileKind,
}

/// Occurrences of one font within one file type, joined with its
/// installation status. `exists_in_system` is `None` until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontSummaryRow {
    pub font_name: String,
    pub file_type: FileKind,
    pub count: i64,
    pub exists_in_system: Option<bool>,
    pub system_font_name: Option<String>,
}

/// Resolution memo for one distinct discovered font name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemFontCacheEntry {
    pub font_name: String,
    pub is_installed: bool,
    pub real_name: Option<String>,
}
