//! Engine discovery: include globs over paths relative to the root,
//! exclude globs over basenames. Exclude always wins.

use crate::error::{HarnessError, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn compile(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| HarnessError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

pub(crate) fn compile_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        b.add(compile(p)?);
    }
    b.build().map_err(|source| HarnessError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

/// Candidate engine binaries under `root`.
///
/// Order follows `includes`, then path order within one pattern; a path
/// matched by several includes is listed once.
pub fn discover_engines(root: &Path, includes: &[String], excludes: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(HarnessError::RootNotFound(root.to_path_buf()));
    }
    let includes: Vec<GlobMatcher> = includes
        .iter()
        .map(|p| compile(p).map(|g| g.compile_matcher()))
        .collect::<Result<_>>()?;
    let excludes = compile_globset(excludes)?;

    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for matcher in &includes {
        for rel in &files {
            if !matcher.is_match(rel) || !seen.insert(rel.as_str()) {
                continue;
            }
            let path = root.join(rel);
            let excluded = path
                .file_name()
                .is_some_and(|base| excludes.is_match(Path::new(base)));
            if excluded {
                tracing::debug!(path = %path.display(), "excluded");
                continue;
            }
            out.push(path);
        }
    }
    Ok(out)
}

/// Regular files under `dir`, as `/`-separated paths relative to `root`.
/// Symlinked directories are not followed. Only an unreadable `root` is an
/// error; unreadable subdirectories are logged and skipped.
fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(source) if dir == root => {
            return Err(HarnessError::Read {
                path: dir.to_path_buf(),
                source,
            })
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return Ok(());
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if path.is_file() {
            if let Ok(rel) = path.strip_prefix(root) {
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(rel.join("/"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, b"").unwrap();
    }

    fn names(paths: &[PathBuf], root: &Path) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn pats(ps: &[&str]) -> Vec<String> {
        ps.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn exclude_wins_over_include() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Stockfish_17.exe");
        touch(dir.path(), "MyEngine_v2.exe");
        touch(dir.path(), "notes.txt");

        let found =
            discover_engines(dir.path(), &pats(&["*.exe"]), &pats(&["Stockfish*"])).unwrap();
        assert_eq!(names(&found, dir.path()), vec!["MyEngine_v2.exe"]);
    }

    #[test]
    fn overlapping_includes_are_deduplicated_in_pattern_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.exe");
        touch(dir.path(), "b.exe");
        touch(dir.path(), "b.bin");

        let found =
            discover_engines(dir.path(), &pats(&["b.*", "*.exe"]), &[]).unwrap();
        assert_eq!(names(&found, dir.path()), vec!["b.bin", "b.exe", "a.exe"]);
    }

    #[test]
    fn star_does_not_cross_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "top.exe");
        touch(dir.path(), "v1/nested.exe");

        let top = discover_engines(dir.path(), &pats(&["*.exe"]), &[]).unwrap();
        assert_eq!(names(&top, dir.path()), vec!["top.exe"]);

        let nested = discover_engines(dir.path(), &pats(&["*/*.exe"]), &[]).unwrap();
        assert_eq!(names(&nested, dir.path()), vec!["v1/nested.exe"]);

        let all = discover_engines(dir.path(), &pats(&["**/*.exe"]), &[]).unwrap();
        assert_eq!(names(&all, dir.path()), vec!["top.exe", "v1/nested.exe"]);
    }

    #[test]
    fn directories_are_not_engines() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("dir.exe")).unwrap();
        let found = discover_engines(dir.path(), &pats(&["*.exe"]), &[]).unwrap();
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "top.exe");
        touch(dir.path(), "locked/hidden.exe");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignores directory permissions
        let denied = fs::read_dir(&locked).is_err();

        let found = discover_engines(dir.path(), &pats(&["**/*.exe"]), &[]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let found = names(&found.unwrap(), dir.path());
        assert!(found.contains(&"top.exe".to_string()));
        if denied {
            assert_eq!(found, vec!["top.exe"]);
        }
    }

    #[test]
    fn missing_root_and_bad_pattern_are_errors() {
        let err = discover_engines(Path::new("/no/such/root"), &pats(&["*"]), &[]).unwrap_err();
        assert!(matches!(err, HarnessError::RootNotFound(_)));

        let dir = tempfile::tempdir().unwrap();
        let err = discover_engines(dir.path(), &pats(&["[unclosed"]), &[]).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPattern { .. }));
    }
}
