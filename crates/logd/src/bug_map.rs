// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Denial-to-bug table loaded from the SELinux bug-map files.
//!
//! Each effective line is `scontext tcontext tclass bug-id`. Files are read in priority
//! order and the first definition of a `(scontext, tcontext, tclass)` triple wins.

use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use fnv::FnvBuildHasher;
use hashbrown::{Equivalent, HashMap};
use tracing::{debug, error, info, warn};

pub const DEFAULT_BUG_MAP_PATHS: [&str; 3] = [
    "/system_ext/etc/selinux/bug_map",
    "/vendor/etc/selinux/selinux_denial_metadata",
    "/system/etc/selinux/bug_map",
];

type DenialKey = (String, String, String);

/// Borrowed form of a key, so lookups do not allocate.
struct DenialRef<'a>(&'a str, &'a str, &'a str);

impl Hash for DenialRef<'_> {
    // Must hash exactly like the owned tuple.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
        self.1.hash(state);
        self.2.hash(state);
    }
}

impl Equivalent<DenialKey> for DenialRef<'_> {
    fn equivalent(&self, key: &DenialKey) -> bool {
        self.0 == key.0 && self.1 == key.1 && self.2 == key.2
    }
}

/// Outcome of loading one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct BugMap {
    denials: HashMap<DenialKey, String, FnvBuildHasher>,
}

impl Default for BugMap {
    fn default() -> Self {
        BugMap {
            denials: HashMap::with_hasher(FnvBuildHasher::default()),
        }
    }
}

impl BugMap {
    /// Loads every readable file in `paths`, in order. Missing files are skipped.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut map = BugMap::default();
        for path in paths {
            let path = path.as_ref();
            match fs::read_to_string(path) {
                Ok(contents) => {
                    map.load_str(&path.display().to_string(), &contents);
                }
                Err(e) => debug!("Skipping bug_map file {}: {}", path.display(), e),
            }
        }
        map
    }

    /// Adds the definitions in `contents`, attributing diagnostics to `source`.
    pub fn load_str(&mut self, source: &str, contents: &str) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for line in contents.split('\n') {
            let fields: Vec<&str> = line.split(' ').filter(|f| !f.is_empty()).collect();
            if fields.first().map_or(true, |f| f.starts_with('#')) {
                continue;
            }
            let [scontext, tcontext, tclass, bug] = fields.as_slice() else {
                error!("Ignored ill-formed bug_map definition in {}: '{}'", source, line);
                summary.errors += 1;
                continue;
            };

            let key = (scontext.to_string(), tcontext.to_string(), tclass.to_string());
            match self.denials.get(&key) {
                Some(existing) => {
                    warn!(
                        "Ignored bug_map definition in {}: '{}', (scontext, tcontext, tclass) \
                         denial combination is already tagged with bug metadata '{}'",
                        source, line, existing
                    );
                    summary.duplicates += 1;
                }
                None => {
                    self.denials.insert(key, bug.to_string());
                    summary.inserted += 1;
                }
            }
        }

        if summary.errors > 0 {
            error!(
                "Loaded bug_map file with {} errors: {}",
                summary.errors, source
            );
        } else {
            info!("Loaded bug_map file: {}", source);
        }
        summary
    }

    #[must_use]
    pub fn lookup(&self, scontext: &str, tcontext: &str, tclass: &str) -> Option<&str> {
        self.denials
            .get(&DenialRef(scontext, tcontext, tclass))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.denials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.denials.is_empty()
    }
}

/// Default file list as owned paths.
#[must_use]
pub fn default_paths() -> Vec<PathBuf> {
    DEFAULT_BUG_MAP_PATHS.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    #[test]
    fn test_lookup() {
        let mut map = BugMap::default();
        let summary = map.load_str(
            "bug_map",
            "# comment\n\nappdomain shell_data_file file 9999\nsystem_server  sysfs  dir  b/1\n",
        );
        assert_eq!(summary.inserted, 2);
        assert_eq!(map.lookup("appdomain", "shell_data_file", "file"), Some("9999"));
        assert_eq!(map.lookup("system_server", "sysfs", "dir"), Some("b/1"));
        assert_eq!(map.lookup("appdomain", "shell_data_file", "dir"), None);
    }

    #[test]
    #[traced_test]
    fn test_malformed_lines_are_counted() {
        let mut map = BugMap::default();
        let summary = map.load_str("bad_map", "a b c\na b c d e\na b c d\n");
        assert_eq!(summary.errors, 2);
        assert_eq!(map.len(), 1);
        assert!(logs_contain("Ignored ill-formed bug_map definition in bad_map: 'a b c'"));
        assert!(logs_contain("Loaded bug_map file with 2 errors: bad_map"));
    }

    #[test]
    #[traced_test]
    fn test_first_definition_wins_across_files() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("system_ext_bug_map");
        let second = dir.path().join("system_bug_map");
        fs::write(&first, "appdomain shell_data_file file b/100\n").unwrap();
        fs::write(&second, "appdomain shell_data_file file b/200\nx y z b/3\n").unwrap();

        let missing = dir.path().join("absent");
        let map = BugMap::load(&[first, missing, second]);
        assert_eq!(map.lookup("appdomain", "shell_data_file", "file"), Some("b/100"));
        assert_eq!(map.lookup("x", "y", "z"), Some("b/3"));
        assert!(logs_contain("already tagged with bug metadata 'b/100'"));
        assert!(logs_contain("Loaded bug_map file:"));
    }

    #[test]
    fn test_duplicate_within_file_keeps_first() {
        let mut map = BugMap::default();
        let summary = map.load_str("m", "a b c 1\na b c 2\n");
        assert_eq!(summary.duplicates, 1);
        assert_eq!(map.lookup("a", "b", "c"), Some("1"));
    }

    #[test]
    fn test_no_files() {
        let map = BugMap::load::<PathBuf>(&[]);
        assert!(map.is_empty());
        assert_eq!(default_paths().len(), 3);
    }
}
