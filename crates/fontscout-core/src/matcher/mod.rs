//! Fuzzy resolution of discovered font names against the host catalog.

pub mod catalog;
pub mod normalize;
pub mod resolve;

pub use catalog::{DirectoryCatalog, FontCatalog, InstalledFont, StaticCatalog};
pub use normalize::{normalize_font_name, strip_style_suffix};
pub use resolve::{
    resolve_and_download, resolve_system_fonts, DownloadReport, DownloadTask, FontInstaller,
    ResolutionSummary,
};

use crate::error::Error;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Overlaps shorter than this are too weak to suggest as a close variation.
const MIN_VARIATION_LEN: usize = 3;

/// Result of [`FontMatcher::find_best_match`].
///
/// `real_name` with `exists == false` is a close variation: an installed
/// font that overlaps the query, offered as a hint only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontMatch {
    pub exists: bool,
    pub real_name: Option<String>,
}

impl FontMatch {
    fn installed(name: &str) -> Self {
        Self {
            exists: true,
            real_name: Some(name.to_string()),
        }
    }

    fn hint(name: &str) -> Self {
        Self {
            exists: false,
            real_name: Some(name.to_string()),
        }
    }

    fn missing() -> Self {
        Self {
            exists: false,
            real_name: None,
        }
    }

    pub fn is_hint(&self) -> bool {
        !self.exists && self.real_name.is_some()
    }
}

/// Matches font names against a cached snapshot of a [`FontCatalog`].
///
/// The cache maps normalized canonical names and aliases to canonical
/// names. It is empty until [`FontMatcher::refresh`] runs and is swapped
/// wholesale on each refresh.
pub struct FontMatcher {
    catalog: Arc<dyn FontCatalog>,
    cache: RwLock<Arc<HashMap<String, String>>>,
}

impl FontMatcher {
    pub fn new(catalog: Arc<dyn FontCatalog>) -> Self {
        Self {
            catalog,
            cache: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Rebuild the cache from the current catalog. Returns the number of
    /// lookup keys.
    pub fn refresh(&self) -> Result<usize, Error> {
        let fonts = self.catalog.installed_fonts()?;
        let mut cache: HashMap<String, String> = HashMap::new();

        // Canonical names take precedence over another face's alias.
        for font in &fonts {
            let key = normalize_font_name(&font.canonical_name);
            if !key.is_empty() {
                cache.entry(key).or_insert_with(|| font.canonical_name.clone());
            }
        }
        for font in &fonts {
            for alias in &font.aliases {
                let key = normalize_font_name(alias);
                if !key.is_empty() {
                    cache.entry(key).or_insert_with(|| font.canonical_name.clone());
                }
            }
        }

        let keys = cache.len();
        *self.cache.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(cache);
        debug!("Font matcher cache rebuilt: {} faces, {} keys", fonts.len(), keys);
        Ok(keys)
    }

    pub fn cached_keys(&self) -> usize {
        self.snapshot().len()
    }

    pub fn find_best_match(&self, font_name: &str) -> FontMatch {
        let cache = self.snapshot();
        let query = normalize_font_name(font_name);
        if query.is_empty() {
            return FontMatch::missing();
        }

        if let Some(real) = cache.get(&query) {
            return FontMatch::installed(real);
        }

        if let Some(base) = strip_style_suffix(&query) {
            if let Some(real) = cache.get(base) {
                return FontMatch::installed(real);
            }
        }

        if query.len() >= MIN_VARIATION_LEN {
            let variation = cache
                .iter()
                .filter(|(key, _)| key.len() >= MIN_VARIATION_LEN)
                .filter(|(key, _)| key.contains(query.as_str()) || query.contains(key.as_str()))
                .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)));
            if let Some((_, real)) = variation {
                return FontMatch::hint(real);
            }
        }

        FontMatch::missing()
    }

    fn snapshot(&self) -> Arc<HashMap<String, String>> {
        Arc::clone(&self.cache.read().unwrap_or_else(|e| e.into_inner()))
    }
}
