//! Small path utilities shared across the registry, renderer, and CLI.

use std::path::{Component, Path, PathBuf};

/// The longest path prefix shared by every root in `roots`, used by
/// `MultiTuRegistry::is_file_included` as a cheap early reject before
/// walking the full root list.
pub fn longest_common_prefix<'a>(paths: impl Iterator<Item = &'a Path>) -> PathBuf {
    let mut iter = paths;
    let Some(first) = iter.next() else {
        return PathBuf::new();
    };
    let mut common: Vec<Component> = first.components().collect();
    for path in iter {
        let components: Vec<Component> = path.components().collect();
        let shared = common
            .iter()
            .zip(components.iter())
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
        if common.is_empty() {
            break;
        }
    }
    common.into_iter().collect()
}

/// Relative path of `path` with respect to `root`, via `path-clean` so
/// `..`-laden inputs still produce a tidy relative path under the output
/// root.
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    match path.strip_prefix(&root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path_clean::clean(&path),
    }
}

/// A `rootpath` value suitable for relative stylesheet links: the
/// sequence of `../` needed to climb from a file `depth` directories deep
/// back to its output root.
pub fn rootpath_for_depth(depth: usize) -> String {
    "../".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_prefix_of_sibling_dirs() {
        let a = PathBuf::from("/proj/src/a");
        let b = PathBuf::from("/proj/src/b");
        assert_eq!(
            longest_common_prefix([a.as_path(), b.as_path()].into_iter()),
            PathBuf::from("/proj/src")
        );
    }

    #[test]
    fn common_prefix_of_single_root_is_itself() {
        let a = PathBuf::from("/proj/src");
        assert_eq!(
            longest_common_prefix([a.as_path()].into_iter()),
            PathBuf::from("/proj/src")
        );
    }

    #[test]
    fn rootpath_depth_zero_is_empty() {
        assert_eq!(rootpath_for_depth(0), "");
        assert_eq!(rootpath_for_depth(2), "../../");
    }
}
