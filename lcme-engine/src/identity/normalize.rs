//! Canonical comparison keys for package names
//!
//! Analyzer ids, scanner path fragments and curation keys spell the same
//! package differently (`coverage.toml`, `coverage_toml`, `Coverage-TOML`).
//! All of them reduce to one key: lowercase, with `.`, `_`, `-` and
//! whitespace collapsed to a single `-`.

/// Reduce a raw name to its canonical comparison key
///
/// Idempotent: `canonical_key(&canonical_key(x)) == canonical_key(x)`.
pub fn canonical_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.trim().chars() {
        if is_separator(c) {
            pending_separator = true;
            continue;
        }
        if pending_separator && !key.is_empty() {
            key.push('-');
        }
        pending_separator = false;
        key.extend(c.to_lowercase());
    }

    key
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '_' | '-') || c.is_whitespace()
}

/// Drop a trailing version from a canonical key
///
/// `left-pad-1-3-0` → `left-pad`, `requests-v2-31` → `requests`,
/// `pkg-2-0-0-rc1` → `pkg`. The first segment is never removed and the key
/// is returned unchanged unless at least one numeric segment was stripped.
pub fn strip_version_suffix(key: &str) -> String {
    version_strip_steps(key)
        .pop()
        .unwrap_or_else(|| key.to_string())
}

/// Every shorter key obtainable by dropping trailing version segments,
/// longest first
///
/// `crc-32-1-2-2` → `crc-32-1-2`, `crc-32-1`, `crc-32`, `crc`. A prefix is
/// only listed once at least one numeric segment has been dropped, so
/// `foo-beta` yields nothing.
pub fn version_strip_steps(key: &str) -> Vec<String> {
    let segments: Vec<&str> = key.split('-').collect();
    let mut steps = Vec::new();
    let mut keep = segments.len();
    let mut saw_numeric = false;

    while keep > 1 {
        let segment = segments[keep - 1];
        if is_numeric_segment(segment) {
            saw_numeric = true;
        } else if !is_prerelease_segment(segment) {
            break;
        }
        keep -= 1;
        if saw_numeric {
            steps.push(segments[..keep].join("-"));
        }
    }

    steps
}

/// `3`, `17rc1`, `v2`, `0b3`
fn is_numeric_segment(segment: &str) -> bool {
    let body = match segment.strip_prefix('v') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => segment,
    };
    body.starts_with(|c: char| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `rc1`, `beta`, `alpha2`, `dev0`, `post1`, `final`
fn is_prerelease_segment(segment: &str) -> bool {
    const TAGS: [&str; 8] = ["alpha", "beta", "rc", "pre", "dev", "post", "final", "snapshot"];
    TAGS.iter().any(|tag| {
        segment
            .strip_prefix(tag)
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_classes_collapse() {
        assert_eq!(canonical_key("coverage.toml"), "coverage-toml");
        assert_eq!(canonical_key("coverage_toml"), "coverage-toml");
        assert_eq!(canonical_key("Coverage-TOML"), "coverage-toml");
        assert_eq!(canonical_key("  zope..interface__x "), "zope-interface-x");
        assert_eq!(canonical_key("-leading.and.trailing-"), "leading-and-trailing");
    }

    #[test]
    fn test_other_characters_survive() {
        assert_eq!(canonical_key("@types/node"), "@types/node");
        assert_eq!(canonical_key("a:b"), "a:b");
    }

    #[test]
    fn test_canonical_key_idempotent() {
        for raw in ["coverage.toml", "A__B--C", "", "...", "x.y_z-w", "Ünïcode Name"] {
            let once = canonical_key(raw);
            assert_eq!(canonical_key(&once), once);
        }
    }

    #[test]
    fn test_strip_version_suffix() {
        assert_eq!(strip_version_suffix("left-pad-1-3-0"), "left-pad");
        assert_eq!(strip_version_suffix("requests-v2-31"), "requests");
        assert_eq!(strip_version_suffix("pkg-2-0-0-rc1"), "pkg");
        assert_eq!(strip_version_suffix("log4j-core-2-17-1"), "log4j-core");
        assert_eq!(strip_version_suffix("python-dateutil-2-8-2"), "python-dateutil");
    }

    #[test]
    fn test_strip_leaves_unversioned_keys_alone() {
        assert_eq!(strip_version_suffix("react-dom"), "react-dom");
        assert_eq!(strip_version_suffix("foo-beta"), "foo-beta");
        assert_eq!(strip_version_suffix("left-pad"), "left-pad");
        assert_eq!(strip_version_suffix("7zip"), "7zip");
        assert_eq!(strip_version_suffix("2to3-1-0"), "2to3");
    }

    #[test]
    fn test_version_strip_steps_longest_first() {
        assert_eq!(
            version_strip_steps("crc-32-1-2-2"),
            vec!["crc-32-1-2", "crc-32-1", "crc-32", "crc"]
        );
        assert_eq!(version_strip_steps("pkg-2-rc1"), vec!["pkg"]);
        assert!(version_strip_steps("foo-beta").is_empty());
        assert!(version_strip_steps("left-pad").is_empty());
        assert_eq!(
            version_strip_steps("crc-32-1-2-2").last().map(String::as_str),
            Some(strip_version_suffix("crc-32-1-2-2").as_str())
        );
    }
}
