/// Style tokens stripped from a normalized name before the second lookup.
pub const STYLE_SUFFIXES: [&str; 7] = [
    "regular", "bold", "italic", "light", "medium", "black", "thin",
];

/// Lowercase and drop hyphens, underscores, spaces and periods, so
/// `Arial-Bold`, `arial bold` and `ARIALBOLD` share one key.
pub fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The normalized name with one trailing style token removed, if any.
pub fn strip_style_suffix(normalized: &str) -> Option<&str> {
    STYLE_SUFFIXES.iter().find_map(|suffix| {
        normalized
            .strip_suffix(suffix)
            .filter(|base| !base.is_empty())
    })
}
