//! Deterministic walk of the source tree.
//!
//! Depth-first pre-order, entries of a directory in lexicographic order of
//! their names, so logs and reruns are reproducible. Every visited node
//! (directories and files, root included) counts against a ceiling; once it
//! is reached the walk ends and the rest of the tree waits for the next run.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Lazy iterator over the files under a root, bounded by a node ceiling.
///
/// Yields regular files only; directories are counted and descended into.
/// Other node kinds (unfollowed symlinks, sockets, fifos) are counted and
/// skipped.
pub struct Traversal {
    walker: walkdir::IntoIter,
    visited: u64,
    max_nodes: u64,
    limit_reached: bool,
}

impl Traversal {
    pub fn new(root: &Path, max_nodes: u64, follow_symlinks: bool) -> Self {
        let walker = WalkDir::new(root)
            .follow_links(follow_symlinks)
            .sort_by_file_name()
            .into_iter();
        Self {
            walker,
            visited: 0,
            max_nodes,
            limit_reached: false,
        }
    }

    /// Nodes visited so far.
    pub fn visited(&self) -> u64 {
        self.visited
    }

    /// True once the ceiling stopped the walk with nodes still unvisited.
    pub fn limit_reached(&self) -> bool {
        self.limit_reached
    }
}

fn walk_error(err: walkdir::Error) -> Error {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, message));
    Error::io(path, source)
}

impl Iterator for Traversal {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.limit_reached {
                return None;
            }
            let entry = self.walker.next()?;
            if self.visited >= self.max_nodes {
                self.limit_reached = true;
                return None;
            }
            self.visited += 1;

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Err(walk_error(err))),
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                debug!(path = %entry.path().display(), "skipping non-regular node");
                continue;
            }
            return Some(Ok(entry.into_path()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(root: &Path, traversal: Traversal) -> Vec<String> {
        traversal
            .map(|p| {
                p.unwrap()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn files_in_a_directory_come_in_name_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["b.txt", "a.txt", "c.txt"] {
            fs::write(tmp.path().join(name), name).unwrap();
        }

        let seen = names(tmp.path(), Traversal::new(tmp.path(), 100, false));
        assert_eq!(seen, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn directories_finish_before_next_sibling() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a").join("deep")).unwrap();
        fs::write(root.join("a").join("deep").join("z.txt"), "z").unwrap();
        fs::write(root.join("a").join("y.txt"), "y").unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();

        let seen = names(root, Traversal::new(root, 100, false));
        assert_eq!(seen, vec!["a/deep/z.txt", "a/y.txt", "b.txt"]);
    }

    #[test]
    fn ceiling_counts_directories_and_files() {
        let tmp = TempDir::new().unwrap();
        for name in ["1.txt", "2.txt", "3.txt", "4.txt", "5.txt"] {
            fs::write(tmp.path().join(name), name).unwrap();
        }

        // root + 1.txt + 2.txt
        let mut traversal = Traversal::new(tmp.path(), 3, false);
        let seen: Vec<_> = traversal.by_ref().map(|p| p.unwrap()).collect();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].ends_with("2.txt"));
        assert_eq!(traversal.visited(), 3);
        assert!(traversal.limit_reached());
    }

    #[test]
    fn exact_fit_is_not_a_limit() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("only.txt"), "x").unwrap();

        let mut traversal = Traversal::new(tmp.path(), 2, false);
        assert_eq!(traversal.by_ref().count(), 1);
        assert_eq!(traversal.visited(), 2);
        assert!(!traversal.limit_reached());
    }
}
