use crate::error::Error;
use crate::scanner::kind::FileKind;
use crate::storage::models::FontOccurrence;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

lazy_static! {
    static ref FONT_TAG: Regex = Regex::new(r"<font>(.*?)</font>").expect("valid font tag pattern");
}

/// Read one template file and return every `<font>` occurrence in it.
///
/// The captured text is kept verbatim. Unreadable or non-UTF-8 files are
/// errors for the caller to log; a file without tags yields an empty list.
pub fn extract_fonts(path: &Path, cancel: &AtomicBool) -> Result<Vec<FontOccurrence>, Error> {
    let content = fs::read_to_string(path)?;
    let kind = FileKind::from_path(path);
    let file_path = path.to_string_lossy().into_owned();

    let occurrences: Vec<FontOccurrence> = extract_fonts_from_str(&content, cancel)
        .into_iter()
        .map(|font_name| FontOccurrence {
            font_name,
            file_path: file_path.clone(),
            file_type: kind,
        })
        .collect();

    trace!("{} font tags in {}", occurrences.len(), path.display());
    Ok(occurrences)
}

/// Capture the inner text of each font tag, stopping at the next match
/// boundary once `cancel` is raised.
pub fn extract_fonts_from_str(content: &str, cancel: &AtomicBool) -> Vec<String> {
    let mut names = Vec::new();
    for caps in FONT_TAG.captures_iter(content) {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if let Some(m) = caps.get(1) {
            names.push(m.as_str().to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_captures_verbatim_inner_text() {
        let cancel = AtomicBool::new(false);
        let content = "<a><font>Helvetica Neue</font><font> arial-Bold </font></a>\n\
                       <font></font><font>Futura</font>";
        let names = extract_fonts_from_str(content, &cancel);
        assert_eq!(names, vec!["Helvetica Neue", " arial-Bold ", "", "Futura"]);
    }

    #[test]
    fn test_no_tags_is_empty() {
        let cancel = AtomicBool::new(false);
        assert!(extract_fonts_from_str("<fonts>Nope</fonts>", &cancel).is_empty());
    }

    #[test]
    fn test_cancel_stops_enumeration() {
        let cancel = AtomicBool::new(true);
        assert!(extract_fonts_from_str("<font>A</font><font>B</font>", &cancel).is_empty());
    }

    #[test]
    fn test_file_type_comes_from_extension() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("lower third.motn");
        fs::write(&path, "<font>Arial</font>\n<font>Arial</font>").unwrap();

        let cancel = AtomicBool::new(false);
        let found = extract_fonts(&path, &cancel).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|o| o.file_type == FileKind::Generator));
        assert!(found.iter().all(|o| o.font_name == "Arial"));
        assert_eq!(found[0].file_path, path.to_string_lossy());
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("broken.moti");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x3c]).unwrap();

        let cancel = AtomicBool::new(false);
        assert!(matches!(extract_fonts(&path, &cancel), Err(Error::Io(_))));
    }
}
