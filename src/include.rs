//! Include resolution: mapping an `#include` path to text via a
//! configurable search-path list, with active-include cycle protection.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use log::trace;

use crate::error::{PreprocessorError, Result};

/// Which delimiter style introduced the include — `"path"` vs `<path>`.
/// Both are searched the same way; the distinction is kept for callers that
/// want to tell them apart in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    System,
    User,
}

/// Resolves include paths against an ordered list of search directories,
/// and guards against recursive self-inclusion.
#[derive(Debug, Default)]
pub struct IncludeResolver {
    search_paths: Vec<PathBuf>,
    active: HashSet<String>,
}

impl IncludeResolver {
    pub fn new() -> Self {
        IncludeResolver {
            search_paths: Vec::new(),
            active: HashSet::new(),
        }
    }

    pub fn add_search_path(&mut self, dir: impl Into<PathBuf>) {
        self.search_paths.push(dir.into());
    }

    /// Searches each configured directory in order, then the bare path, for
    /// a readable file. Returns the file's contents on the first match.
    pub fn resolve(&self, path: &str) -> Option<String> {
        for dir in &self.search_paths {
            let candidate = dir.join(path);
            trace!("trying include path {}", candidate.display());
            if let Ok(contents) = fs::read_to_string(&candidate) {
                trace!("resolved include '{}' via {}", path, candidate.display());
                return Some(contents);
            }
        }
        trace!("trying include path {} (bare)", path);
        let found = fs::read_to_string(path).ok();
        if found.is_some() {
            trace!("resolved include '{}' via bare path", path);
        }
        found
    }

    /// Marks `label` as actively being processed. Fails with
    /// `IncludeCycleError` if it already is.
    pub fn enter(&mut self, label: &str) -> Result<()> {
        if self.active.contains(label) {
            return Err(PreprocessorError::include_cycle(format!(
                "recursive include of '{}'",
                label
            )));
        }
        self.active.insert(label.to_string());
        Ok(())
    }

    /// Releases `label` from the active set. Always safe to call, even if
    /// `enter` was never called for it — callers invoke this on every exit
    /// path (success or error) of the recursive include they guarded.
    pub fn leave(&mut self, label: &str) {
        self.active.remove(label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_from_search_path() {
        let dir = tempfile_dir();
        let file_path = dir.join("test.h");
        let mut f = fs::File::create(&file_path).unwrap();
        writeln!(f, "#define FOO 1").unwrap();

        let mut resolver = IncludeResolver::new();
        resolver.add_search_path(&dir);
        let contents = resolver.resolve("test.h").unwrap();
        assert!(contents.contains("FOO"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_resolves_to_none() {
        let resolver = IncludeResolver::new();
        assert!(resolver.resolve("does-not-exist.h").is_none());
    }

    #[test]
    fn cycle_detection_round_trips() {
        let mut resolver = IncludeResolver::new();
        resolver.enter("a.h").unwrap();
        assert!(resolver.enter("a.h").is_err());
        resolver.leave("a.h");
        assert!(resolver.enter("a.h").is_ok());
    }

    fn tempfile_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("cpp-core-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
