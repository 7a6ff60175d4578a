//! Package archive container.
//!
//! A package file is a plain ustar tape: one 512-byte header per entry
//! holding its archive path, mode and byte length, the content padded to the
//! next block, and two zero blocks as end marker. Nothing is compressed and
//! there is no directory metadata beyond the entry paths.
//!
//! Writers build the whole tape in memory and only then move it into place,
//! so a failed write never leaves a partial package behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::trace;
use walkdir::WalkDir;

/// Directory inside a binary package holding its executables.
pub const BIN_DIR: &str = "bin";

/// Errors raised while writing or reading a package archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Refused to replace an existing archive.
    #[error("archive already exists: {}", path.display())]
    AlreadyExists {
        /// The archive that was left untouched.
        path: PathBuf,
    },

    /// An entry's source file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    SourceUnreadable {
        /// The unreadable staging file.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },

    /// The archive structure is invalid or an entry is truncated.
    #[error("corrupt archive {}: {reason}", path.display())]
    CorruptArchive {
        /// The archive being read.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Any other IO failure on the archive file itself.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// The archive path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

/// A file staged for archiving and its destination inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File on disk whose bytes are archived.
    pub source_path: PathBuf,
    /// Slash-separated path inside the archive.
    pub archive_path: String,
}

impl ArchiveEntry {
    /// Stage `source_path` under `archive_path`.
    pub fn new(source_path: impl Into<PathBuf>, archive_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            archive_path: archive_path.into(),
        }
    }
}

/// Mode recorded for an entry: executables under `bin/`, plain files elsewhere.
fn entry_mode(archive_path: &str) -> u32 {
    if archive_path.starts_with(&format!("{BIN_DIR}/")) {
        0o755
    } else {
        0o644
    }
}

/// Write `entries` into a package archive at `path`, preserving their order.
///
/// # Errors
///
/// Returns [`ArchiveError::AlreadyExists`] if `path` exists and `overwrite`
/// is false (the existing file is left byte-for-byte intact),
/// [`ArchiveError::SourceUnreadable`] if an entry cannot be read, and
/// [`ArchiveError::Io`] if the archive cannot be persisted.
pub fn write(path: &Path, entries: &[ArchiveEntry], overwrite: bool) -> Result<(), ArchiveError> {
    if !overwrite && path.exists() {
        return Err(ArchiveError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }

    let io_err = |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tape = tar::Builder::new(Vec::new());
    tape.mode(tar::HeaderMode::Deterministic);

    for entry in entries {
        trace!(
            file_path = %entry.source_path.display(),
            archive_path = %entry.archive_path,
            "Writing file"
        );
        let body = fs::read(&entry.source_path).map_err(|source| ArchiveError::SourceUnreadable {
            path: entry.source_path.clone(),
            source,
        })?;

        let mut header = tar::Header::new_ustar();
        header.set_size(body.len() as u64);
        header.set_mode(entry_mode(&entry.archive_path));
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);
        tape.append_data(&mut header, &entry.archive_path, body.as_slice())
            .map_err(io_err)?;
    }

    let bytes = tape.into_inner().map_err(io_err)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    staged.write_all(&bytes).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;

    if overwrite {
        staged.persist(path).map_err(|e| io_err(e.error))?;
    } else {
        staged.persist_noclobber(path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                ArchiveError::AlreadyExists {
                    path: path.to_path_buf(),
                }
            } else {
                io_err(e.error)
            }
        })?;
    }

    Ok(())
}

/// Read every entry of the archive at `path` into memory, keyed by archive
/// path. When a path repeats, the last entry wins.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if the file cannot be read and
/// [`ArchiveError::CorruptArchive`] on invalid headers or truncated data.
pub fn read(path: &Path) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
    let bytes = fs::read(path).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let corrupt = |reason: String| ArchiveError::CorruptArchive {
        path: path.to_path_buf(),
        reason,
    };

    let mut contents = BTreeMap::new();
    let mut archive = tar::Archive::new(bytes.as_slice());

    for entry in archive.entries().map_err(|e| corrupt(e.to_string()))? {
        let mut entry = entry.map_err(|e| corrupt(e.to_string()))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }

        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let expected = entry.size();
        let mut body = Vec::with_capacity(usize::try_from(expected).unwrap_or_default());
        entry
            .read_to_end(&mut body)
            .map_err(|e| corrupt(format!("{name}: {e}")))?;

        if body.len() as u64 != expected {
            return Err(corrupt(format!(
                "{name}: expected {expected} bytes, found {}",
                body.len()
            )));
        }

        contents.insert(name, body);
    }

    Ok(contents)
}

/// Stage every file under `root` as an archive entry rooted at `prefix`.
///
/// Files and directories whose name is listed in `excludes` are skipped,
/// along with everything beneath them. Entries come out sorted by path so two
/// builds of the same tree produce identical archives.
///
/// # Errors
///
/// Returns any IO error hit while walking `root`.
pub fn collect_entries(
    root: &Path,
    prefix: &str,
    excludes: &[&str],
) -> io::Result<Vec<ArchiveEntry>> {
    let prefix = prefix.trim_matches('/');
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .is_some_and(|name| excludes.contains(&name))
        });

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            if entry.path_is_symlink() {
                trace!(file = %entry.path().display(), "Skipping symlink");
            }
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let archive_path = if prefix.is_empty() {
            relative
        } else {
            format!("{prefix}/{relative}")
        };
        entries.push(ArchiveEntry::new(entry.path(), archive_path));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn staged(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_write_then_read_returns_original_content() {
        let tmp = tempdir().unwrap();
        let json = staged(tmp.path(), "a.json", "This is a json file");
        let txt = staged(tmp.path(), "b.txt", "This is a txt file");
        let xml = staged(tmp.path(), "c.xml", "This is an xml file");
        let out = tmp.path().join("out.pkg");

        write(
            &out,
            &[
                ArchiveEntry::new(&xml, "test/xmlfile.xml"),
                ArchiveEntry::new(&json, "jsonfile.json"),
                ArchiveEntry::new(&txt, "txtfile.txt"),
            ],
            true,
        )
        .unwrap();

        let contents = read(&out).unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents["jsonfile.json"], b"This is a json file");
        assert_eq!(contents["test/xmlfile.xml"], b"This is an xml file");
        assert_eq!(contents["txtfile.txt"], b"This is a txt file");
    }

    #[test]
    fn test_empty_and_binary_content_survive() {
        let tmp = tempdir().unwrap();
        let empty = staged(tmp.path(), "empty", "");
        let blob = tmp.path().join("blob");
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1500).collect();
        fs::write(&blob, &bytes).unwrap();
        let out = tmp.path().join("out.pkg");

        write(
            &out,
            &[
                ArchiveEntry::new(&empty, "empty"),
                ArchiveEntry::new(&blob, "bin/blob"),
            ],
            false,
        )
        .unwrap();

        let contents = read(&out).unwrap();
        assert!(contents["empty"].is_empty());
        assert_eq!(contents["bin/blob"], bytes);
    }

    #[test]
    fn test_long_archive_paths_are_kept() {
        let tmp = tempdir().unwrap();
        let file = staged(tmp.path(), "f.go", "package main");
        let long_path = format!("github.com/{}/main.go", "nested/".repeat(30));
        let out = tmp.path().join("out.pkg");

        write(&out, &[ArchiveEntry::new(&file, long_path.clone())], true).unwrap();

        let contents = read(&out).unwrap();
        assert_eq!(contents[&long_path], b"package main");
    }

    #[test]
    fn test_refuses_to_overwrite_existing_archive() {
        let tmp = tempdir().unwrap();
        let file = staged(tmp.path(), "f.txt", "new content");
        let out = staged(tmp.path(), "out.pkg", "previously released");

        let err = write(&out, &[ArchiveEntry::new(&file, "f.txt")], false).unwrap_err();
        assert!(matches!(err, ArchiveError::AlreadyExists { .. }));
        assert_eq!(fs::read(&out).unwrap(), b"previously released");
    }

    #[test]
    fn test_overwrite_replaces_existing_archive() {
        let tmp = tempdir().unwrap();
        let file = staged(tmp.path(), "f.txt", "new content");
        let out = staged(tmp.path(), "out.pkg", "previously released");

        write(&out, &[ArchiveEntry::new(&file, "f.txt")], true).unwrap();
        assert_eq!(read(&out).unwrap()["f.txt"], b"new content");
    }

    #[test]
    fn test_unreadable_source_leaves_no_archive() {
        let tmp = tempdir().unwrap();
        let file = staged(tmp.path(), "f.txt", "content");
        let out = tmp.path().join("out.pkg");

        let err = write(
            &out,
            &[
                ArchiveEntry::new(&file, "f.txt"),
                ArchiveEntry::new(tmp.path().join("missing"), "missing"),
            ],
            true,
        )
        .unwrap_err();

        assert!(matches!(err, ArchiveError::SourceUnreadable { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_duplicate_paths_last_entry_wins() {
        let tmp = tempdir().unwrap();
        let first = staged(tmp.path(), "first", "first");
        let second = staged(tmp.path(), "second", "second");
        let out = tmp.path().join("out.pkg");

        write(
            &out,
            &[
                ArchiveEntry::new(&first, "same"),
                ArchiveEntry::new(&second, "same"),
            ],
            true,
        )
        .unwrap();

        assert_eq!(read(&out).unwrap()["same"], b"second");
    }

    #[test]
    fn test_truncated_archive_is_corrupt() {
        let tmp = tempdir().unwrap();
        let blob = tmp.path().join("blob");
        fs::write(&blob, vec![7u8; 2000]).unwrap();
        let out = tmp.path().join("out.pkg");
        write(&out, &[ArchiveEntry::new(&blob, "blob")], true).unwrap();

        let bytes = fs::read(&out).unwrap();
        fs::write(&out, &bytes[..512 + 700]).unwrap();

        let err = read(&out).unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptArchive { .. }));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out.pkg");
        fs::write(&out, vec![0x41u8; 1024]).unwrap();

        let err = read(&out).unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptArchive { .. }));
    }

    #[test]
    fn test_identical_inputs_produce_identical_archives() {
        let tmp = tempdir().unwrap();
        let file = staged(tmp.path(), "f.txt", "same");
        let a = tmp.path().join("a.pkg");
        let b = tmp.path().join("b.pkg");

        write(&a, &[ArchiveEntry::new(&file, "f.txt")], true).unwrap();
        write(&b, &[ArchiveEntry::new(&file, "f.txt")], true).unwrap();
        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn test_collect_entries_prefixes_and_excludes() {
        let tmp = tempdir().unwrap();
        staged(tmp.path(), "main.go", "package main");
        staged(tmp.path(), "internal/util/util.go", "package util");
        staged(tmp.path(), "build/scratch", "x");
        staged(tmp.path(), "notes.xml", "x");

        let entries = collect_entries(tmp.path(), "some/prefix", &["build", "notes.xml"]).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.archive_path.as_str()).collect();

        assert_eq!(
            paths,
            vec!["some/prefix/internal/util/util.go", "some/prefix/main.go"]
        );
        assert_eq!(entries[1].source_path, tmp.path().join("main.go"));
    }
}
