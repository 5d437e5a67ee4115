//! Input handling: reads dump bytes from files, directories, and zip
//! archives into `(name, content)` sources — an opaque enumerator yielding
//! `(path, bytes)` pairs.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One loaded dump source: a display name and its decoded UTF-8 content.
pub struct Source {
    pub name: String,
    pub content: String,
}

/// Reads every dump under `paths`, recursing into directories and expanding
/// zip archives. Archive entries are filtered by `archive_pattern`; plain
/// files and directory entries are read unconditionally.
pub fn read_sources(paths: &[PathBuf], archive_pattern: &Regex) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for path in paths {
        read_one(path, archive_pattern, &mut sources)?;
    }
    Ok(sources)
}

fn read_one(path: &Path, archive_pattern: &Regex, sources: &mut Vec<Source>) -> Result<()> {
    if path.is_dir() {
        // Don't follow symlinks: a symlink could point outside the scanned
        // directory tree.
        for entry in walkdir::WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if !entry_path.is_file() {
                continue;
            }
            if entry_path.extension().is_some_and(|ext| ext == "zip") {
                read_zip(entry_path, archive_pattern, sources)?;
            } else {
                read_file(entry_path, path, sources)?;
            }
        }
        return Ok(());
    }

    if path.extension().is_some_and(|ext| ext == "zip") {
        return read_zip(path, archive_pattern, sources);
    }

    read_file(path, path.parent().unwrap_or(Path::new("")), sources)
}

fn read_file(path: &Path, base: &Path, sources: &mut Vec<Source>) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    sources.push(Source { name, content });
    Ok(())
}

fn read_zip(path: &Path, archive_pattern: &Regex, sources: &mut Vec<Source>) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open archive: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file).with_context(|| format!("Failed to read archive: {}", path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let entry_name = entry.name().to_string();
        if !archive_pattern.is_match(&entry_name) {
            continue;
        }
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to decode archive entry: {entry_name}"))?;
        sources.push(Source {
            name: format!("{}:{}", path.display(), entry_name),
            content,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_single_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10").unwrap();

        let pattern = Regex::new(r"^(.*/)?stacks\.txt$").unwrap();
        let sources = read_sources(&[file.path().to_path_buf()], &pattern).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].content.contains("main.worker"));
    }

    #[test]
    fn reads_multiple_files() {
        let mut file1 = NamedTempFile::new().unwrap();
        let mut file2 = NamedTempFile::new().unwrap();
        writeln!(file1, "goroutine 1 [running]:\nmain.a()\n\t/a.go:1").unwrap();
        writeln!(file2, "goroutine 1 [running]:\nmain.b()\n\t/b.go:1").unwrap();

        let pattern = Regex::new(r"^(.*/)?stacks\.txt$").unwrap();
        let sources = read_sources(
            &[file1.path().to_path_buf(), file2.path().to_path_buf()],
            &pattern,
        )
        .unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let pattern = Regex::new(r"^(.*/)?stacks\.txt$").unwrap();
        let result = read_sources(&[PathBuf::from("/nonexistent/stacks.txt")], &pattern);
        assert!(result.is_err());
    }
}
