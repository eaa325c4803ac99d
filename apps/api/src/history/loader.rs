//! History loader. Walks the history folder and decodes every reference file.
//!
//! Files are visited in file-name order so repeated scans of the same tree yield
//! identical output. A file that cannot be read is reported in `HistoryScan::skipped`
//! and never aborts the scan.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::history::{HistoryError, DEFAULT_CATEGORY};

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Decoders tried, in order, once strict UTF-8 has failed.
/// GB2312 is a subset of GBK, so the GBK pass covers both.
const FALLBACK_DECODERS: &[(&str, fn(&[u8]) -> Option<String>)] =
    &[("gbk", decode_gbk), ("latin-1", decode_latin1)];

/// A single history reference file.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryFile {
    pub path: PathBuf,
    pub name: String,
    pub content: String,
    /// First directory below the history root, or `DEFAULT_CATEGORY`.
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one history folder scan.
#[derive(Debug, Default)]
pub struct HistoryScan {
    pub files: Vec<HistoryFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Loads all supported history files below `root`.
/// A missing root yields an empty list.
pub fn load_history(root: &Path) -> Result<Vec<HistoryFile>, HistoryError> {
    scan_history(root).map(|scan| scan.files)
}

/// Walks `root` recursively and reads every `.txt` / `.md` / `.markdown` file.
///
/// Only a failure on the root itself is returned as an error; unreadable entries
/// further down are logged and recorded in `skipped`.
pub fn scan_history(root: &Path) -> Result<HistoryScan, HistoryError> {
    let mut scan = HistoryScan::default();

    if !root.exists() {
        warn!("History folder not found: {}", root.display());
        return Ok(scan);
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(HistoryError::Walk(e)),
            Err(e) => {
                warn!("Skipping unreadable history entry: {e}");
                scan.skipped.push(SkippedFile {
                    path: e.path().map(Path::to_path_buf).unwrap_or_default(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !is_supported(path) {
            continue;
        }

        match read_history_file(path) {
            Ok(content) if content.trim().is_empty() => {
                debug!("Skipping empty history file: {}", path.display());
            }
            Ok(content) => {
                debug!("Loaded history file: {}", path.display());
                scan.files.push(HistoryFile {
                    path: path.to_path_buf(),
                    name: entry.file_name().to_string_lossy().into_owned(),
                    content,
                    category: file_category(root, path),
                });
            }
            Err(e) => {
                warn!("{e}");
                scan.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Loaded {} history files from {} ({} skipped)",
        scan.files.len(),
        root.display(),
        scan.skipped.len()
    );
    Ok(scan)
}

/// Reads a file as UTF-8, falling back to GBK and finally Latin-1.
pub fn read_history_file(path: &Path) -> Result<String, HistoryError> {
    let bytes = fs::read(path).map_err(|source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_text(&bytes).ok_or_else(|| HistoryError::Decode {
        path: path.to_path_buf(),
    })
}

fn decode_text(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.strip_prefix('\u{feff}').unwrap_or(text).to_string());
    }
    FALLBACK_DECODERS.iter().find_map(|(label, decode)| {
        let decoded = decode(bytes);
        if decoded.is_some() {
            debug!("Decoded history file as {label}");
        }
        decoded
    })
}

fn decode_gbk(bytes: &[u8]) -> Option<String> {
    encoding_rs::GBK
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn file_category(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.as_os_str().to_string_lossy().into_owned(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_root_returns_empty() {
        let files = load_history(Path::new("/definitely/not/a/history/folder")).unwrap();
        assert!(files.is_empty());
        assert!(load_history(Path::new("")).unwrap().is_empty());
    }

    #[test]
    fn test_categories_from_first_directory() {
        let dir = tempdir().unwrap();
        write(dir.path(), "technical_issues/login.md", "登录失败".as_bytes());
        write(dir.path(), "technical_issues/deep/nested.txt", b"nested case");
        write(dir.path(), "root_note.txt", b"root level note");

        let files = load_history(dir.path()).unwrap();
        assert_eq!(files.len(), 3);

        let login = files.iter().find(|f| f.name == "login.md").unwrap();
        assert_eq!(login.category, "technical_issues");
        assert_eq!(login.content, "登录失败");

        let nested = files.iter().find(|f| f.name == "nested.txt").unwrap();
        assert_eq!(nested.category, "technical_issues");

        let root_note = files.iter().find(|f| f.name == "root_note.txt").unwrap();
        assert_eq!(root_note.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_unsupported_and_empty_files_skipped() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a/notes.pdf", b"binary-ish");
        write(dir.path(), "a/blank.md", b"   \n\n  ");
        write(dir.path(), "a/upper.MARKDOWN", b"kept");

        let files = load_history(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "upper.MARKDOWN");
    }

    #[test]
    fn test_gbk_file_is_decoded() {
        let dir = tempdir().unwrap();
        let (encoded, _, had_errors) = encoding_rs::GBK.encode("登录失败，用户无法进入系统");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&encoded).is_err());
        write(dir.path(), "legacy/old.txt", &encoded);

        let files = load_history(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "登录失败，用户无法进入系统");
    }

    #[test]
    fn test_latin1_fallback_never_fails() {
        // 0xFF 0xFE 0x80 is neither valid UTF-8 nor valid GBK.
        let decoded = decode_text(&[b'c', b'a', b'f', 0xFF, 0xFE, 0x80]).unwrap();
        assert_eq!(decoded.chars().count(), 6);
        assert!(decoded.starts_with("caf"));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let decoded = decode_text("\u{feff}hello".as_bytes()).unwrap();
        assert_eq!(decoded, "hello");
    }

    #[test]
    fn test_scan_order_is_deterministic() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b/two.md", b"two");
        write(dir.path(), "a/one.md", b"one");
        write(dir.path(), "a/zero.md", b"zero");

        let first: Vec<String> = load_history(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        let second: Vec<String> = load_history(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(first, vec!["one.md", "zero.md", "two.md"]);
        assert_eq!(first, second);
    }
}
