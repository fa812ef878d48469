//! Surface-IR fixture discovery for `optic`.
//!
//! Walks the given directories with `ignore::WalkBuilder`, picking up
//! surface-IR `.json` documents (spec §6 "Source input") rather than
//! source-language files, since the surface-syntax parser is an
//! external collaborator this core never implements.

use std::collections::HashSet;
use std::time::Instant;

use compiler_error::{Error, ErrorKind, Result};
use ignore::WalkBuilder;
use tracing::info;

/// Directories to skip while walking for fixtures.
fn should_skip_dir(name: &str) -> bool {
    matches!(
        name,
        "target" | "node_modules" | ".git" | "dist" | "out" | "build"
    )
}

/// Discover `.json` surface-IR documents under `dirs`, plus any explicit
/// `files`. Order is deterministic (sorted) so repeated runs over the
/// same fixture directory produce byte-identical output (spec §5).
pub fn discover_files(files: &[String], dirs: &[String]) -> Result<Vec<String>> {
    let start = Instant::now();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    let mut add_path = |path: &str| {
        if seen.insert(path.to_string()) {
            out.push(path.to_string());
        }
    };

    for file in files {
        add_path(file);
    }

    for dir in dirs {
        let mut builder = WalkBuilder::new(dir);
        builder.standard_filters(true).follow_links(false).filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let Some(file_type) = entry.file_type() else {
                return true;
            };
            if !file_type.is_dir() {
                return true;
            }
            let Some(name) = entry.file_name().to_str() else {
                return true;
            };
            !should_skip_dir(&name.to_ascii_lowercase())
        });

        for entry in builder.build() {
            let entry = entry.map_err(|e| {
                Error::new(ErrorKind::SurfaceIrInvalid, format!("failed to walk directory {dir}: {e}"))
                    .with_operation("discovery::discover_files")
            })?;
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                add_path(&path.to_string_lossy());
            }
        }
    }

    out.sort();

    info!(
        "surface-IR discovery: {:.3}s ({} files)",
        start.elapsed().as_secs_f64(),
        out.len()
    );

    if out.is_empty() {
        return Err(Error::new(
            ErrorKind::SurfaceIrInvalid,
            "no surface-IR .json input found; pass --file or --dir",
        )
        .with_operation("discovery::discover_files"));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_json_fixtures_under_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("b.txt"), "not json").unwrap();
        let files = discover_files(&[], &[dir.path().to_string_lossy().to_string()]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.json"));
    }

    #[test]
    fn explicit_files_are_included_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, "{}").unwrap();
        let path_str = path.to_string_lossy().to_string();
        let files = discover_files(&[path_str.clone(), path_str.clone()], &[]).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn empty_discovery_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_files(&[], &[dir.path().to_string_lossy().to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SurfaceIrInvalid);
    }
}
