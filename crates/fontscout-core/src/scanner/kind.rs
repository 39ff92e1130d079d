use serde::Serialize;
use std::fmt;
use std::path::Path;

/// The template kinds a scan targets, keyed by file extension.
///
/// The labels are cosmetic; nothing in the pipeline behaves differently per
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Title,
    Generator,
    Transition,
    Effect,
    Unknown,
}

impl FileKind {
    pub const TARGETS: [FileKind; 4] = [
        FileKind::Title,
        FileKind::Generator,
        FileKind::Transition,
        FileKind::Effect,
    ];

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(FileKind::Unknown)
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "moti" => FileKind::Title,
            "motn" => FileKind::Generator,
            "motr" => FileKind::Transition,
            "moef" => FileKind::Effect,
            _ => FileKind::Unknown,
        }
    }

    /// Normalized extension stored as the occurrence's file type.
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Title => "moti",
            FileKind::Generator => "motn",
            FileKind::Transition => "motr",
            FileKind::Effect => "moef",
            FileKind::Unknown => "unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::Title => "Title",
            FileKind::Generator => "Generator",
            FileKind::Transition => "Transition",
            FileKind::Effect => "Effect",
            FileKind::Unknown => "Unknown",
        }
    }

    pub fn is_target(self) -> bool {
        self != FileKind::Unknown
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
