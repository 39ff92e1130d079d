pub mod extract;
pub mod kind;
pub mod walk;

pub use extract::{extract_fonts, extract_fonts_from_str};
pub use kind::FileKind;
pub use walk::{discover_template_files, Discovery, WalkIssue, WalkOptions};
