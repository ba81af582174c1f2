//! SPDX element identifier grammar
//!
//! Valid: `SPDXRef-` followed by one or more ASCII letters, digits, `.` or `-`.
//! Derived identifiers (rewrites, stubs) are stricter: dots are normalized
//! to hyphens as well, so a derived slug only ever contains letters, digits
//! and single hyphens.

/// Prefix of every SPDX element identifier
pub const SPDX_REF_PREFIX: &str = "SPDXRef-";

/// Identifier of the document root when the input does not name one
pub const DEFAULT_DOCUMENT_ID: &str = "SPDXRef-DOCUMENT";

/// Check an identifier against the SPDX identifier grammar
pub fn is_valid_spdx_id(id: &str) -> bool {
    match id.strip_prefix(SPDX_REF_PREFIX) {
        Some(rest) => {
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        }
        None => false,
    }
}

/// Normalize a slug: anything other than ASCII letters, digits and `-`
/// becomes `-`, runs collapse, ends are trimmed
pub fn normalize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Derive a valid identifier from an arbitrary (possibly invalid) one
///
/// Idempotent: `normalize_spdx_id(normalize_spdx_id(x)) == normalize_spdx_id(x)`.
pub fn normalize_spdx_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix(SPDX_REF_PREFIX).unwrap_or(trimmed);
    let slug = normalize_slug(body);
    if slug.is_empty() {
        format!("{}unnamed", SPDX_REF_PREFIX)
    } else {
        format!("{}{}", SPDX_REF_PREFIX, slug)
    }
}

/// Slug part of an identifier (text after `SPDXRef-`)
pub fn slug_of(id: &str) -> &str {
    id.strip_prefix(SPDX_REF_PREFIX).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_spdx_id("SPDXRef-DOCUMENT"));
        assert!(is_valid_spdx_id("SPDXRef-Package-NPM-lodash-4.17.21"));
        assert!(is_valid_spdx_id("SPDXRef-a"));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_spdx_id("SPDXRef-"));
        assert!(!is_valid_spdx_id("Package-lodash"));
        assert!(!is_valid_spdx_id("SPDXRef-coverage_toml"));
        assert!(!is_valid_spdx_id("SPDXRef-@scope/pkg"));
        assert!(!is_valid_spdx_id("SPDXRef-has space"));
        assert!(!is_valid_spdx_id("spdxref-lower"));
    }

    #[test]
    fn test_normalize_rewrites_dots_and_specials() {
        assert_eq!(
            normalize_spdx_id("SPDXRef-PyPI-coverage.toml_7.2"),
            "SPDXRef-PyPI-coverage-toml-7-2"
        );
        assert_eq!(
            normalize_spdx_id("SPDXRef-@types//node"),
            "SPDXRef-types-node"
        );
        assert_eq!(normalize_spdx_id("lodash"), "SPDXRef-lodash");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["SPDXRef-a..b", "x y z", "SPDXRef-", "--", "SPDXRef-Pkg-1.0.0"] {
            let once = normalize_spdx_id(raw);
            assert_eq!(normalize_spdx_id(&once), once, "not idempotent for {raw}");
            assert!(is_valid_spdx_id(&once));
        }
    }

    #[test]
    fn test_empty_slug_gets_placeholder() {
        assert_eq!(normalize_spdx_id("SPDXRef-___"), "SPDXRef-unnamed");
    }

    #[test]
    fn test_slug_of() {
        assert_eq!(slug_of("SPDXRef-ghost"), "ghost");
        assert_eq!(slug_of("ghost"), "ghost");
    }
}
