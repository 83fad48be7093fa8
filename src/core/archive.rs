//! Snapshot archive of the project tree for the push strategy.
//!
//! Produces a gzip-compressed tar with entries relative to the project root,
//! so `tar -xzf <archive> -C <remote path>` recreates the tree in place.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use glob_match::glob_match;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Path globs omitted from the archive.
///
/// A pattern without `/` is tested against each path component, so `.git`
/// drops `.git/` at any depth. A pattern with `/` is tested against the
/// relative path and each of its ancestors.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    component_patterns: Vec<String>,
    path_patterns: Vec<String>,
}

impl Exclusions {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut exclusions = Self::default();
        for raw in patterns {
            let pattern = raw
                .as_ref()
                .trim()
                .trim_start_matches("./")
                .trim_end_matches('/')
                .to_string();
            if pattern.is_empty() {
                continue;
            }
            if pattern.contains('/') {
                exclusions.path_patterns.push(pattern);
            } else {
                exclusions.component_patterns.push(pattern);
            }
        }
        exclusions
    }

    pub fn is_excluded(&self, relative: &Path) -> bool {
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        if components.iter().any(|name| {
            self.component_patterns
                .iter()
                .any(|p| glob_match(p, name))
        }) {
            return true;
        }

        if self.path_patterns.is_empty() {
            return false;
        }
        (1..=components.len()).any(|depth| {
            let prefix = components[..depth].join("/");
            self.path_patterns.iter().any(|p| glob_match(p, &prefix))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: usize,
    pub bytes: u64,
}

/// Write `root` (minus exclusions) to a tar.gz at `dest`.
pub fn build_archive(root: &Path, dest: &Path, exclusions: &Exclusions) -> Result<ArchiveSummary> {
    if !root.is_dir() {
        return Err(Error::archive_failed(
            "project root is not a directory",
            Some(root.display().to_string()),
        ));
    }

    let file = File::create(dest).map_err(|e| {
        Error::archive_failed(e.to_string(), Some(format!("create {}", dest.display())))
    })?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    tar.follow_symlinks(false);

    let mut entries = 0usize;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map(|rel| !exclusions.is_excluded(rel))
                .unwrap_or(false)
        });

    for entry in walker {
        let entry = entry.map_err(|e| Error::archive_failed(e.to_string(), Some("walk project".to_string())))?;
        let path = entry.path();
        if path == dest {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map_err(|e| Error::archive_failed(e.to_string(), Some(path.display().to_string())))?;

        tar.append_path_with_name(path, rel).map_err(|e| {
            Error::archive_failed(e.to_string(), Some(format!("add {}", rel.display())))
        })?;
        entries += 1;
    }

    let encoder = tar
        .into_inner()
        .map_err(|e| Error::archive_failed(e.to_string(), Some("finish tar".to_string())))?;
    let file = encoder
        .finish()
        .map_err(|e| Error::archive_failed(e.to_string(), Some("finish gzip".to_string())))?;
    file.sync_all()
        .map_err(|e| Error::archive_failed(e.to_string(), Some("sync archive".to_string())))?;

    let bytes = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    log::debug!("archived {} entries ({} bytes) to {}", entries, bytes, dest.display());

    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        entries,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let mut reader = tar::Archive::new(GzDecoder::new(File::open(archive).unwrap()));
        reader
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "yume.py", "import discord\n");
        write(dir.path(), "cogs/music.py", "class Music: ...\n");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main\n");
        write(dir.path(), "node_modules/left-pad/index.js", "module.exports = 1\n");
        write(dir.path(), "web/node_modules/x.js", "x\n");
        write(dir.path(), "cogs/__pycache__/music.cpython-312.pyc", "\0");
        write(dir.path(), "data/logs/run.log", "log\n");
        dir
    }

    #[test]
    fn component_patterns_match_at_any_depth() {
        let ex = Exclusions::new(&[".git", "node_modules", "*.pyc"]);
        assert!(ex.is_excluded(Path::new(".git")));
        assert!(ex.is_excluded(Path::new(".git/objects/ab")));
        assert!(ex.is_excluded(Path::new("web/node_modules/x.js")));
        assert!(ex.is_excluded(Path::new("cogs/a.pyc")));
        assert!(!ex.is_excluded(Path::new("cogs/music.py")));
        assert!(!ex.is_excluded(Path::new(".gitignore")));
    }

    #[test]
    fn path_patterns_match_prefixes() {
        let ex = Exclusions::new(&["./data/logs/", "build/*.tmp"]);
        assert!(ex.is_excluded(Path::new("data/logs")));
        assert!(ex.is_excluded(Path::new("data/logs/run.log")));
        assert!(ex.is_excluded(Path::new("build/a.tmp")));
        assert!(!ex.is_excluded(Path::new("data/words.txt")));
        assert!(!ex.is_excluded(Path::new("other/data/logs")));
    }

    #[test]
    fn archive_omits_vcs_metadata_and_dependency_caches() {
        let src = project();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("snapshot.tar.gz");

        let ex = Exclusions::new(&[".git", "node_modules", "__pycache__", "data/logs"]);
        let summary = build_archive(src.path(), &dest, &ex).unwrap();

        let names = entry_names(&dest);
        assert_eq!(summary.entries, names.len());
        assert!(names.contains(&"yume.py".to_string()));
        assert!(names.contains(&"cogs/music.py".to_string()));
        assert!(names.iter().all(|n| !n.starts_with(".git")));
        assert!(names.iter().all(|n| !n.contains("node_modules")));
        assert!(names.iter().all(|n| !n.contains("__pycache__")));
        assert!(names.iter().all(|n| !n.starts_with("data/logs")));
        assert!(names.contains(&"data".to_string()));
    }

    #[test]
    fn extraction_reproduces_tree_minus_git() {
        let src = project();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("snapshot.tar.gz");
        build_archive(src.path(), &dest, &Exclusions::new(&[".git"])).unwrap();

        let unpacked = tempfile::tempdir().unwrap();
        tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()))
            .unpack(unpacked.path())
            .unwrap();

        for entry in WalkDir::new(src.path()).min_depth(1) {
            let entry = entry.unwrap();
            let rel = entry.path().strip_prefix(src.path()).unwrap();
            let copy = unpacked.path().join(rel);
            if rel.starts_with(".git") {
                assert!(!copy.exists(), "{} should be excluded", rel.display());
            } else if entry.file_type().is_file() {
                assert_eq!(fs::read(entry.path()).unwrap(), fs::read(&copy).unwrap());
            } else {
                assert!(copy.is_dir());
            }
        }
    }

    #[test]
    fn missing_root_fails_before_writing() {
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("snapshot.tar.gz");
        let err = build_archive(&out.path().join("absent"), &dest, &Exclusions::default())
            .unwrap_err();
        assert_eq!(err.code.as_str(), "archive.failed");
        assert!(!dest.exists());
    }
}
