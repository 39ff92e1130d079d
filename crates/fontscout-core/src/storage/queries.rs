use super::models::*;
use super::sqlite::IndexStore;
use crate::scanner::FileKind;
use rusqlite::{params, OptionalExtension, Result, Row};
use std::collections::BTreeMap;
use tracing::debug;

impl IndexStore {
    // ── Occurrences ──────────────────────────────────────────────

    /// Insert a batch of occurrences in a single transaction. Either every
    /// row lands or none do.
    pub fn insert_batch(&self, occurrences: &[FontOccurrence]) -> Result<usize> {
        if occurrences.is_empty() {
            return Ok(0);
        }

        let mut conn = self.writer();
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO font_occurrence (font_name, file_path, file_type) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for occurrence in occurrences {
                count += stmt.execute(params![
                    occurrence.font_name,
                    occurrence.file_path,
                    occurrence.file_type.extension(),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} font occurrences", count);
        Ok(count)
    }

    /// Full-text search over font name and path. Results are ranked by
    /// relevance; an empty query lists the first `limit` rows unfiltered.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<FontOccurrence>> {
        let expression = match fts_match_expression(query, None) {
            Some(expression) => expression,
            None => return self.all_fonts(limit),
        };

        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT o.font_name, o.file_path, o.file_type \
             FROM font_occurrence o \
             JOIN font_occurrence_fts fts ON o.id = fts.rowid \
             WHERE font_occurrence_fts MATCH ?1 \
             ORDER BY rank \
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![expression, limit as i64], row_to_occurrence)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn all_fonts(&self, limit: usize) -> Result<Vec<FontOccurrence>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT font_name, file_path, file_type FROM font_occurrence \
             ORDER BY id LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_occurrence)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn total_count(&self) -> Result<i64> {
        self.reader()
            .query_row("SELECT COUNT(*) FROM font_occurrence", [], |row| row.get(0))
    }

    // ── Aggregates ───────────────────────────────────────────────

    /// Occurrence counts grouped by (font name, file type), left-joined with
    /// the system-font cache. A non-empty `query` restricts the rows to font
    /// names matching it.
    pub fn filtered_summary(&self, query: &str) -> Result<Vec<FontSummaryRow>> {
        let conn = self.reader();
        let map_row = |row: &Row<'_>| {
            let file_type: String = row.get(1)?;
            Ok(FontSummaryRow {
                font_name: row.get(0)?,
                file_type: FileKind::from_extension(&file_type),
                count: row.get(2)?,
                exists_in_system: row.get(3)?,
                system_font_name: row.get(4)?,
            })
        };

        let rows = match fts_match_expression(query, Some("font_name")) {
            Some(expression) => {
                let mut stmt = conn.prepare(
                    "SELECT o.font_name, o.file_type, COUNT(*), s.is_installed, s.real_name \
                     FROM font_occurrence o \
                     LEFT JOIN system_font s ON s.font_name = o.font_name \
                     WHERE o.font_name IN ( \
                         SELECT font_name FROM font_occurrence_fts \
                         WHERE font_occurrence_fts MATCH ?1) \
                     GROUP BY o.font_name, o.file_type \
                     ORDER BY o.font_name, o.file_type",
                )?;
                let rows = stmt
                    .query_map(params![expression], map_row)?
                    .collect::<Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT o.font_name, o.file_type, COUNT(*), s.is_installed, s.real_name \
                     FROM font_occurrence o \
                     LEFT JOIN system_font s ON s.font_name = o.font_name \
                     GROUP BY o.font_name, o.file_type \
                     ORDER BY o.font_name, o.file_type",
                )?;
                let rows = stmt
                    .query_map([], map_row)?
                    .collect::<Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    pub fn distinct_font_names(&self) -> Result<Vec<String>> {
        let conn = self.reader();
        let mut stmt =
            conn.prepare("SELECT DISTINCT font_name FROM font_occurrence ORDER BY font_name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn file_type_counts(&self) -> Result<BTreeMap<FileKind, i64>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT file_type, COUNT(*) FROM font_occurrence GROUP BY file_type",
        )?;
        let mut counts = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (file_type, count) = row?;
            *counts.entry(FileKind::from_extension(&file_type)).or_insert(0) += count;
        }
        Ok(counts)
    }

    pub fn font_name_counts(&self) -> Result<BTreeMap<String, i64>> {
        let conn = self.reader();
        let mut stmt =
            conn.prepare("SELECT font_name, COUNT(*) FROM font_occurrence GROUP BY font_name")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<String, i64>>>()?;
        Ok(counts)
    }

    /// File type of the earliest stored occurrence of each font.
    pub fn font_file_types(&self) -> Result<BTreeMap<String, FileKind>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT font_name, file_type FROM font_occurrence \
             WHERE id IN (SELECT MIN(id) FROM font_occurrence GROUP BY font_name)",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let file_type: String = row.get(1)?;
                Ok((row.get(0)?, FileKind::from_extension(&file_type)))
            })?
            .collect::<Result<BTreeMap<String, FileKind>>>()?;
        Ok(rows)
    }

    // ── System font cache ────────────────────────────────────────

    pub fn update_system_font_info(
        &self,
        font_name: &str,
        is_installed: bool,
        real_name: Option<&str>,
    ) -> Result<()> {
        self.writer().execute(
            "INSERT INTO system_font (font_name, is_installed, real_name) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(font_name) DO UPDATE SET \
                 is_installed = excluded.is_installed, \
                 real_name = excluded.real_name",
            params![font_name, is_installed, real_name],
        )?;
        Ok(())
    }

    pub fn system_font_info(&self, font_name: &str) -> Result<Option<SystemFontCacheEntry>> {
        self.reader()
            .query_row(
                "SELECT font_name, is_installed, real_name FROM system_font WHERE font_name = ?1",
                params![font_name],
                row_to_cache_entry,
            )
            .optional()
    }

    /// Fonts resolved as not installed, with their close-variation hints.
    pub fn missing_fonts(&self) -> Result<Vec<SystemFontCacheEntry>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT font_name, is_installed, real_name FROM system_font \
             WHERE is_installed = 0 ORDER BY font_name",
        )?;
        let entries = stmt
            .query_map([], row_to_cache_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }
}

fn row_to_occurrence(row: &Row<'_>) -> Result<FontOccurrence> {
    let file_type: String = row.get(2)?;
    Ok(FontOccurrence {
        font_name: row.get(0)?,
        file_path: row.get(1)?,
        file_type: FileKind::from_extension(&file_type),
    })
}

fn row_to_cache_entry(row: &Row<'_>) -> Result<SystemFontCacheEntry> {
    Ok(SystemFontCacheEntry {
        font_name: row.get(0)?,
        is_installed: row.get(1)?,
        real_name: row.get(2)?,
    })
}

/// Turn free text into an FTS5 expression that cannot break the query
/// syntax: every token becomes a quoted prefix phrase (embedded quotes
/// doubled) and the phrases are ANDed. Tokens without any alphanumeric
/// character are dropped; `None` means "no filter".
pub(crate) fn fts_match_expression(query: &str, column: Option<&str>) -> Option<String> {
    let phrases: Vec<String> = query
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| {
            let phrase = format!("\"{}\"*", token.replace('"', "\"\""));
            match column {
                Some(column) => format!("{} : {}", column, phrase),
                None => phrase,
            }
        })
        .collect();

    if phrases.is_empty() {
        None
    } else {
        Some(phrases.join(" AND "))
    }
}
