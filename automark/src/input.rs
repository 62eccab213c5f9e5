//! This module provides the interface between a student's submission on disk and the grader.
//!
//! Everything related to finding which of the student's files a test exercises, and which
//! external executables the adapters run, is implemented here. Nothing in this module
//! mutates the file system.

use glob::{MatchOptions, Pattern};
use is_executable::is_executable;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use walkdir::{DirEntry, WalkDir};

/// How a declared target pattern is matched against a student's submission.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The pattern is a literal path relative to the submission root.
    Exact,
    /// The pattern is a shell-style glob over the submission root (`**` recurses).
    #[default]
    Glob,
    /// The pattern is a regular expression searched for in the content of every file.
    Content,
}

/// A successful resolution of one pattern.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Resolution {
    pub path: PathBuf,
    /// Every file that matched, in walk order. The first one is `path`.
    pub candidates: Vec<PathBuf>,
}

impl Resolution {
    fn from_candidates(mut candidates: Vec<PathBuf>) -> Option<Self> {
        candidates.sort();
        let path = candidates.first()?.clone();
        Some(Self { path, candidates })
    }

    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    /// A one-line note for reports when more than one file matched.
    pub fn ambiguity_note(&self, root: &Path, pattern: &str) -> Option<String> {
        if !self.is_ambiguous() {
            return None;
        }
        Some(format!(
            "{} files matched '{pattern}': using {}",
            self.candidates.len(),
            display_relative(root, &self.path)
        ))
    }
}

/// Finds the file under `root` matching `pattern`.
///
/// Returns `None` when nothing matches (including when `pattern` is not a valid glob or regex
/// for the chosen mode). When several files match, the first in walk order is selected; the
/// caller can inspect [`Resolution::candidates`] to report the ambiguity.
pub fn resolve(root: &Path, pattern: &str, mode: MatchMode) -> Option<Resolution> {
    debug!("Resolving '{pattern}' ({mode:?}) under '{}'", root.display());
    match mode {
        MatchMode::Exact => {
            let path = root.join(pattern);
            if path.exists() {
                Some(Resolution {
                    path: path.clone(),
                    candidates: vec![path],
                })
            } else {
                None
            }
        }
        MatchMode::Glob => {
            let glob = match Pattern::new(pattern) {
                Ok(glob) => glob,
                Err(err) => {
                    warn!("⚠️  Invalid glob '{pattern}': {err}");
                    return None;
                }
            };
            let options = MatchOptions {
                case_sensitive: true,
                require_literal_separator: true,
                require_literal_leading_dot: true,
            };
            let matches = submission_files(root)
                .into_iter()
                .filter(|path| {
                    relative_slash_path(root, path)
                        .is_some_and(|relative| glob.matches_with(&relative, options))
                })
                .collect();
            Resolution::from_candidates(matches)
        }
        MatchMode::Content => {
            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(err) => {
                    warn!("⚠️  Invalid content pattern '{pattern}': {err}");
                    return None;
                }
            };
            let matches = submission_files(root)
                .into_iter()
                .filter(|path| match fs::read_to_string(path) {
                    Ok(content) => regex.is_match(&content),
                    Err(err) => {
                        debug!("Skipping unreadable file '{}': {err}", path.display());
                        false
                    }
                })
                .collect();
            Resolution::from_candidates(matches)
        }
    }
}

/// Every regular, non-hidden file under `root`, in deterministic walk order.
///
/// A missing root yields no files.
pub fn submission_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// `path` relative to `root`, with `/` separators on every platform.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn display_relative(root: &Path, path: &Path) -> String {
    relative_slash_path(root, path).unwrap_or_else(|| path.display().to_string())
}

/// Finds an executable program.
///
/// A name containing a path separator is checked directly. Otherwise the directories in
/// `PATH` are tried first, then each of `search_paths` is searched recursively for an
/// executable file whose path ends with `name` (so `bin/vivado` works).
pub fn find_executable(name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let is_program = |path: &Path| path.is_file() && is_executable(path);

    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        if is_program(&path) {
            return Some(path);
        }
    } else if let Some(paths) = env::var_os("PATH") {
        for dir in env::split_paths(&paths) {
            let candidate = dir.join(name);
            if is_program(&candidate) {
                return Some(candidate);
            }
        }
    }

    for root in search_paths {
        let found = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.path().ends_with(name) && is_program(entry.path()));
        if let Some(entry) = found {
            return Some(entry.into_path());
        }
    }
    None
}
