//! JSON Pointer (RFC 6901) helpers. Pointers are the node identity scheme:
//! `""` is the root, child segments are appended with `/` and `~0`/`~1`
//! escaping for literal `~` and `/` in object keys.

/// Escape a raw key for use as a pointer token (`~` → `~0`, `/` → `~1`).
pub fn escape_token(raw: &str) -> String {
    raw.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`escape_token`]. Order matters: `~1` before `~0`.
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Append a key segment to a parent pointer.
pub fn join(parent: &str, key: &str) -> String {
    format!("{}/{}", parent, escape_token(key))
}

/// Append an array index segment to a parent pointer.
pub fn join_index(parent: &str, index: usize) -> String {
    format!("{}/{}", parent, index)
}

/// Parent pointer, or `None` for the root.
pub fn parent(pointer: &str) -> Option<&str> {
    if pointer.is_empty() {
        return None;
    }
    Some(&pointer[..pointer.rfind('/').unwrap_or(0)])
}

/// Last segment of a pointer, unescaped; `None` for the root.
pub fn last_segment(pointer: &str) -> Option<String> {
    if pointer.is_empty() {
        return None;
    }
    pointer.rsplit('/').next().map(unescape_token)
}

/// All segments from the root, unescaped. Root yields an empty vec.
pub fn segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer.split('/').skip(1).map(unescape_token).collect()
}

/// Every proper ancestor pointer of `pointer`, root first. The pointer
/// itself is not included.
pub fn ancestors(pointer: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = pointer;
    while let Some(p) = parent(current) {
        out.push(p.to_string());
        current = p;
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_round_trip() {
        let raw = "a/b~c";
        let escaped = escape_token(raw);
        assert_eq!(escaped, "a~1b~0c");
        assert_eq!(unescape_token(&escaped), raw);
    }

    #[test]
    fn join_and_parent() {
        let p = join("", "users");
        assert_eq!(p, "/users");
        let p2 = join_index(&p, 3);
        assert_eq!(p2, "/users/3");
        assert_eq!(parent(&p2), Some("/users"));
        assert_eq!(parent(&p), Some(""));
        assert_eq!(parent(""), None);
    }

    #[test]
    fn ancestors_root_first() {
        assert_eq!(ancestors("/a/b/c"), vec!["", "/a", "/a/b"]);
        assert!(ancestors("").is_empty());
    }

    #[test]
    fn segments_unescape() {
        assert_eq!(segments("/a~1b/0"), vec!["a/b", "0"]);
    }
}
