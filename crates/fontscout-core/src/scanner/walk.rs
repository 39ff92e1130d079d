use crate::error::Error;
use crate::scanner::kind::FileKind;
use dashmap::DashMap;
use rayon::prelude::*;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, error};

const HIDDEN_PREFIX: char = '.';

/// Directory extensions treated as opaque bundles and never descended into.
const BUNDLE_EXTENSIONS: [&str; 7] = [
    "app",
    "bundle",
    "framework",
    "plugin",
    "fcpbundle",
    "photoslibrary",
    "kext",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    pub skip_hidden: bool,
}

/// A subtree that could not be enumerated. Files found elsewhere are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkIssue {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub issues: Vec<WalkIssue>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

struct WalkContext<'a> {
    options: WalkOptions,
    cancel: &'a AtomicBool,
    found: DashMap<FileKind, Vec<PathBuf>>,
    issues: Mutex<Vec<WalkIssue>>,
}

impl WalkContext<'_> {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn record_issue(&self, path: &Path, err: &std::io::Error) {
        error!("Error reading directory {}: {}", path.display(), err);
        self.issues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(WalkIssue {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
    }
}

/// Parallel directory traversal collecting template files under `root`.
///
/// Symlinks are never followed and bundle directories are skipped. An
/// unreadable root is an error; unreadable subdirectories are reported in
/// [`Discovery::issues`]. When `cancel` is raised during the walk the
/// result is empty, never partial.
pub fn discover_template_files(
    root: &Path,
    options: &WalkOptions,
    cancel: &AtomicBool,
) -> Result<Discovery, Error> {
    let entries = fs::read_dir(root).map_err(|source| Error::WalkFailed {
        path: root.to_path_buf(),
        source,
    })?;

    let ctx = WalkContext {
        options: *options,
        cancel,
        found: DashMap::new(),
        issues: Mutex::new(Vec::new()),
    };

    visit_entries(root, entries, &ctx);

    if ctx.cancelled() {
        debug!("Walk of {} cancelled, discarding partial results", root.display());
        return Ok(Discovery::default());
    }

    let mut files: Vec<PathBuf> = ctx
        .found
        .into_iter()
        .flat_map(|(_, paths)| paths)
        .collect();
    files.sort();

    let mut issues = ctx.issues.into_inner().unwrap_or_else(|e| e.into_inner());
    issues.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(
        "Discovered {} template files under {} ({} unreadable directories)",
        files.len(),
        root.display(),
        issues.len()
    );

    Ok(Discovery { files, issues })
}

fn visit_dir(dir: &Path, ctx: &WalkContext<'_>) {
    if ctx.cancelled() {
        return;
    }

    match fs::read_dir(dir) {
        Ok(entries) => visit_entries(dir, entries, ctx),
        Err(err) => ctx.record_issue(dir, &err),
    }
}

fn visit_entries(dir: &Path, entries: fs::ReadDir, ctx: &WalkContext<'_>) {
    entries.par_bridge().for_each(|entry_result| {
        if ctx.cancelled() {
            return;
        }

        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                ctx.record_issue(dir, &err);
                return;
            }
        };

        // `DirEntry::file_type` does not traverse symlinks.
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(err) => {
                ctx.record_issue(&entry.path(), &err);
                return;
            }
        };
        if file_type.is_symlink() {
            return;
        }

        let name = entry.file_name();
        if ctx.options.skip_hidden && is_hidden(&name) {
            return;
        }

        let path = entry.path();
        if file_type.is_dir() {
            if !is_bundle(&path) {
                visit_dir(&path, ctx);
            }
        } else if file_type.is_file() {
            let kind = FileKind::from_path(&path);
            if kind.is_target() {
                ctx.found.entry(kind).or_default().push(path);
            }
        }
    });
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with(HIDDEN_PREFIX)
}

fn is_bundle(dir: &Path) -> bool {
    dir.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            BUNDLE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
