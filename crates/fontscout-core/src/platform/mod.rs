use std::env;
use std::path::PathBuf;

pub const FONT_DIRS_ENV: &str = "FONTSCOUT_SYSTEM_FONT_DIRS";

/// Directories holding installed fonts on this host.
///
/// `FONTSCOUT_SYSTEM_FONT_DIRS` (a `PATH`-style list) replaces the platform
/// defaults. Only existing directories are returned.
pub fn system_font_dirs() -> Vec<PathBuf> {
    if let Some(raw) = env::var_os(FONT_DIRS_ENV) {
        return existing_unique(env::split_paths(&raw));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();

    #[cfg(target_os = "macos")]
    {
        candidates.push(PathBuf::from("/System/Library/Fonts"));
        candidates.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        candidates.push(PathBuf::from("/usr/share/fonts"));
        candidates.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(&home).join(".local/share/fonts"));
            candidates.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(system_root) = env::var_os("SYSTEMROOT") {
            candidates.push(PathBuf::from(system_root).join("Fonts"));
        }
        if let Some(local_appdata) = env::var_os("LOCALAPPDATA") {
            candidates.push(PathBuf::from(local_appdata).join("Microsoft/Windows/Fonts"));
        }
    }

    existing_unique(candidates)
}

fn existing_unique(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = paths.into_iter().filter(|p| p.is_dir()).collect();
    dirs.sort();
    dirs.dedup();
    dirs
}
