// Bulk collection: walk a folder, structure every matching source, combine.

use std::fs;
use std::path::{Path, PathBuf};

use confronta_config::Settings;

use crate::emission;
use crate::error::SourceError;
use crate::ledger;
use crate::normalized::Normalized;

/// Files under `root` accepted by `accept`, at most `max_depth` levels deep
/// (files directly in `root` are level 1). Sorted for stable runs.
pub fn discover(root: &Path, max_depth: usize, accept: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(root, 1, max_depth, &accept, &mut found);
    found.sort();
    found
}

fn walk(dir: &Path, level: usize, max_depth: usize, accept: &dyn Fn(&Path) -> bool, found: &mut Vec<PathBuf>) {
    if level > max_depth {
        return;
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot read directory {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, level + 1, max_depth, accept, found);
        } else if accept(&path) {
            found.push(path);
        }
    }
}

/// Files named exactly `name` (case-insensitive) under `root`.
pub fn discover_named(root: &Path, max_depth: usize, name: &str) -> Vec<PathBuf> {
    discover(root, max_depth, |p| {
        p.file_name()
            .map(|f| f.to_string_lossy().eq_ignore_ascii_case(name))
            .unwrap_or(false)
    })
}

pub fn is_workbook_file(path: &Path) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()) else {
        return false;
    };
    let lock_file = path
        .file_name()
        .map(|f| f.to_string_lossy().starts_with("~$"))
        .unwrap_or(false);
    matches!(ext.as_str(), "xlsx" | "xlsm" | "xls") && !lock_file
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Collected {
    pub normalized: Normalized,
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// Structure every file, skipping the ones that fail. The first usable file
/// fixes the batch period.
fn collect(
    root: &Path,
    kind: &str,
    files: Vec<PathBuf>,
    structure: impl Fn(&Path) -> Result<Normalized, SourceError>,
) -> Result<Collected, SourceError> {
    if files.is_empty() {
        return Err(SourceError::Empty(format!("no {kind} files found under {}", root.display())));
    }
    let mut batch: Option<Normalized> = None;
    let mut used = Vec::new();
    let mut skipped = Vec::new();
    for path in files {
        match structure(&path) {
            Ok(normalized) => {
                log::info!("{}: {} rows", path.display(), normalized.row_count());
                match batch.as_mut() {
                    Some(b) => b.absorb(normalized),
                    None => batch = Some(normalized),
                }
                used.push(path);
            }
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                skipped.push(SkippedFile { path, reason: e.to_string() });
            }
        }
    }
    let mut normalized = batch.ok_or_else(|| {
        SourceError::Empty(format!("none of the {} {kind} files under {} could be structured", skipped.len(), root.display()))
    })?;
    normalized.finish();
    Ok(Collected { normalized, files: used, skipped })
}

/// Every `.SUA` ledger under `root`.
pub fn collect_ledgers(root: &Path, settings: &Settings) -> Result<Collected, SourceError> {
    let files = discover(root, settings.collect.max_depth, ledger::is_ledger_file);
    collect(root, "ledger", files, |p| ledger::structure_ledger(p, settings))
}

/// Every emission workbook under `root`. Workbooks that fail the structural
/// check are skipped like any other failure.
pub fn collect_emissions(root: &Path, settings: &Settings) -> Result<Collected, SourceError> {
    let files = discover(root, settings.collect.max_depth, is_workbook_file);
    collect(root, "emission", files, |p| emission::structure_emission(p, settings))
}
