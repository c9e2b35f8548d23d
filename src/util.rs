use std::iter::repeat;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(&it))
}

/// Generates a video room identifier shared by everyone attending one occurrence.
pub fn new_room_id() -> String {
    format!("room-{}", Uuid::new_v4().simple())
}

/// Splits a comma separated environment value into trimmed, non-empty entries.
pub fn split_list(value: impl AsRef<str>) -> Vec<String> {
    value
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_ids_are_unique() {
        let a = new_room_id();
        let b = new_room_id();
        assert!(a.starts_with("room-"));
        assert_ne!(a, b);
    }

    #[test]
    fn split_list_skips_blanks() {
        assert_eq!(
            split_list(" a@x.com, ,b@x.com,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
    }

    #[test]
    fn finds_first_existing_subpath() {
        let root = std::env::temp_dir();
        let found = find_first_subpath(&root, &["missing.yml", "."], Path::exists);
        assert_eq!(found, Some(root.join(".")));
    }
}
