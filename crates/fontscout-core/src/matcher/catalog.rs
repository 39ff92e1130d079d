use crate::error::Error;
use crate::platform;
use rayon::prelude::*;
use read_fonts::tables::name::NameId;
use read_fonts::{FontRef, TableProvider};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// An installed font face as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledFont {
    pub canonical_name: String,
    /// Display, family and full names that should also resolve to
    /// `canonical_name`.
    pub aliases: Vec<String>,
}

impl InstalledFont {
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }
}

/// Source of the host's installed font list.
pub trait FontCatalog: Send + Sync {
    fn installed_fonts(&self) -> Result<Vec<InstalledFont>, Error>;
}

/// In-memory catalog. Clones share the same list, so a platform installer
/// (or a test) can add fonts that a matcher sees on its next refresh.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    fonts: Arc<RwLock<Vec<InstalledFont>>>,
}

impl StaticCatalog {
    pub fn new(fonts: Vec<InstalledFont>) -> Self {
        Self {
            fonts: Arc::new(RwLock::new(fonts)),
        }
    }

    pub fn add(&self, font: InstalledFont) {
        self.fonts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(font);
    }
}

impl FontCatalog for StaticCatalog {
    fn installed_fonts(&self) -> Result<Vec<InstalledFont>, Error> {
        Ok(self.fonts.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

/// Catalog built by reading the `name` table of every font file under a
/// set of directories.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    roots: Vec<PathBuf>,
}

impl DirectoryCatalog {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Catalog over the platform's font directories.
    pub fn system() -> Self {
        Self::new(platform::system_font_dirs())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl FontCatalog for DirectoryCatalog {
    fn installed_fonts(&self) -> Result<Vec<InstalledFont>, Error> {
        let mut files = Vec::new();
        for root in &self.roots {
            for entry in WalkDir::new(root).follow_links(false) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_font(entry.path()) => {
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(err) => warn!("Skipping unreadable font path: {}", err),
                }
            }
        }

        let fonts: Vec<InstalledFont> = files
            .par_iter()
            .flat_map_iter(|path| match load_faces(path) {
                Ok(faces) => faces,
                Err(err) => {
                    warn!("Could not read font {}: {}", path.display(), err);
                    Vec::new()
                }
            })
            .collect();

        debug!(
            "Font catalog: {} faces from {} files in {} directories",
            fonts.len(),
            files.len(),
            self.roots.len()
        );
        Ok(fonts)
    }
}

fn is_font(path: &Path) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return false,
    };

    matches!(ext.as_str(), "ttf" | "otf" | "ttc" | "otc")
}

fn load_faces(path: &Path) -> Result<Vec<InstalledFont>, Error> {
    let data = fs::read(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut faces = Vec::new();
    for font in FontRef::fonts(&data) {
        let font = font.map_err(|e| Error::Catalog(format!("{}: {}", path.display(), e)))?;
        faces.push(face_names(&font, &stem));
    }
    Ok(faces)
}

fn face_names(font: &FontRef, stem: &str) -> InstalledFont {
    let mut postscript = None;
    let mut full = None;
    let mut aliases = Vec::new();

    if let Ok(name_table) = font.name() {
        let data = name_table.string_data();
        for record in name_table.name_record() {
            if !record.is_unicode() {
                continue;
            }
            let id = record.name_id();
            let wanted = id == NameId::FAMILY_NAME
                || id == NameId::TYPOGRAPHIC_FAMILY_NAME
                || id == NameId::FULL_NAME
                || id == NameId::POSTSCRIPT_NAME;
            if !wanted {
                continue;
            }
            let Ok(entry) = record.string(data) else {
                continue;
            };
            let rendered = entry.to_string().trim().to_string();
            if rendered.is_empty() {
                continue;
            }
            if id == NameId::POSTSCRIPT_NAME && postscript.is_none() {
                postscript = Some(rendered.clone());
            } else if id == NameId::FULL_NAME && full.is_none() {
                full = Some(rendered.clone());
            }
            aliases.push(rendered);
        }
    }

    if !stem.is_empty() {
        aliases.push(stem.to_string());
    }
    aliases.sort_unstable();
    aliases.dedup();

    let canonical_name = postscript
        .or(full)
        .unwrap_or_else(|| stem.to_string());
    aliases.retain(|a| *a != canonical_name);

    InstalledFont {
        canonical_name,
        aliases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_recognises_font_extensions() {
        assert!(is_font(Path::new("/A/B/font.ttf")));
        assert!(is_font(Path::new("/A/B/font.OTF")));
        assert!(!is_font(Path::new("/A/B/font.txt")));
        assert!(!is_font(Path::new("/A/B/font")));
    }

    #[test]
    fn test_static_catalog_clones_share_fonts() {
        let catalog = StaticCatalog::default();
        let handle = catalog.clone();
        handle.add(InstalledFont::new("Futura-Medium"));
        assert_eq!(catalog.installed_fonts().unwrap().len(), 1);
    }

    #[test]
    fn test_directory_catalog_skips_unparseable_files() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("broken.ttf"), b"not a font").unwrap();
        fs::write(tmp.path().join("readme.txt"), b"hello").unwrap();

        let catalog = DirectoryCatalog::new([tmp.path()]);
        assert!(catalog.installed_fonts().unwrap().is_empty());
    }
}
