//! Store path helpers.
//!
//! Catalog keys never start with a slash; the root is the empty string.
//! Paths handed to users keep the `/`-rooted form.

/// Strip leading and trailing slashes. `"/"` and `""` both become `""`.
pub fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Join a parent path and a child name with exactly one slash.
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    format!("{parent}/{child}")
}

/// User-facing form of a normalized path: rooted at `/`.
pub fn display(path: &str) -> String {
    let path = normalize(path);
    if path.is_empty() {
        "/".to_string()
    } else {
        format!("/{path}")
    }
}

/// Key of a metadata document (`.zgroup`, `.zarray`, `.zattrs`) under `path`.
pub fn metadata_key(path: &str, suffix: &str) -> String {
    let path = normalize(path);
    if path.is_empty() {
        suffix.to_string()
    } else {
        format!("{path}/{suffix}")
    }
}

/// Parent of a normalized path; the root's parent is the root.
pub fn parent_of(path: &str) -> &str {
    let path = normalize(path);
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Last segment of a path.
pub fn name_of(path: &str) -> &str {
    let path = normalize(path);
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Whether the last segment names a hidden (dot-prefixed) object.
pub fn is_hidden(path: &str) -> bool {
    name_of(path).starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/a/b/"), "a/b");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "child"), "/child");
        assert_eq!(join("/a/", "/b"), "/a/b");
        assert_eq!(join("a", "b"), "a/b");
    }

    #[test]
    fn test_display() {
        assert_eq!(display(""), "/");
        assert_eq!(display("a/b"), "/a/b");
        assert_eq!(display("/a/b"), "/a/b");
    }

    #[test]
    fn test_metadata_key() {
        assert_eq!(metadata_key("/", ".zgroup"), ".zgroup");
        assert_eq!(metadata_key("/a/b", ".zarray"), "a/b/.zarray");
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_of("a/b/c"), "a/b");
        assert_eq!(parent_of("a"), "");
        assert_eq!(parent_of(""), "");
        assert_eq!(name_of("/a/b/c"), "c");
        assert_eq!(name_of("a"), "a");
        assert!(is_hidden("a/.zattrs"));
        assert!(!is_hidden("a/0.0"));
    }
}
