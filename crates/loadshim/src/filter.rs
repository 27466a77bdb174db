//! Path filtering: decides, per path, whether a load should be intercepted.
//!
//! Matching is pure string work over whitelist/blacklist directory entries
//! and an extension set. Directory matches are scored by entry length so the
//! deepest listed directory wins; a path listed on both sides with equal
//! score is denied. Lookup is a linear scan over the configured entries —
//! fine at the intended scale (a handful of roots), and a known limit if a
//! filter ever grows thousands of entries.

use serde::{Deserialize, Serialize};

/// Whitelist/blacklist/extension filter over load paths.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
    extensions: Vec<String>,
}

/// Serde-loadable filter rules, for embedders that keep them in config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Extensions matched by [`PathFilter::with_defaults`]: script sources plus
/// loadable archive bundles.
pub const DEFAULT_EXTENSIONS: &[&str] = &["rhai", "zip"];

impl PathFilter {
    /// An empty filter that matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter preconfigured with [`DEFAULT_EXTENSIONS`]. Directory lists
    /// start empty.
    pub fn with_defaults() -> Self {
        let mut filter = Self::new();
        for ext in DEFAULT_EXTENSIONS {
            filter.add_extension(ext);
        }
        filter
    }

    /// Build a filter from deserialized rules.
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut filter = Self::new();
        for dir in &config.whitelist {
            filter.add_whitelist(dir);
        }
        for dir in &config.blacklist {
            filter.add_blacklist(dir);
        }
        for ext in &config.extensions {
            filter.add_extension(ext);
        }
        filter
    }

    /// Add a directory whose contents should be intercepted.
    ///
    /// An empty string matches everything.
    pub fn add_whitelist(&mut self, path: &str) {
        self.whitelist.push(path.trim_end_matches('/').to_string());
    }

    /// Add a directory whose contents should not be intercepted.
    pub fn add_blacklist(&mut self, path: &str) {
        self.blacklist.push(path.trim_end_matches('/').to_string());
    }

    /// Add a file extension to intercept, with or without the leading dot.
    /// Comparison is case-sensitive.
    pub fn add_extension(&mut self, extension: &str) {
        self.extensions
            .push(extension.trim_start_matches('.').to_string());
    }

    /// Whether a load of `path` should be intercepted.
    ///
    /// Pure and deterministic: same path and rules, same answer.
    pub fn test(&self, path: &str) -> bool {
        if !self.has_valid_extension(path) {
            return false;
        }
        is_listed(path, &self.whitelist) > is_listed(path, &self.blacklist)
    }

    fn has_valid_extension(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => {
                self.extensions.iter().any(|e| e == extension)
            }
            _ => false,
        }
    }
}

/// Match strength of `path` against a directory list.
///
/// An entry exactly equal to the path short-circuits with its own length,
/// independent of directory matching. Otherwise the deepest directory
/// containing the path scores its length plus one (for the separator), and
/// no match scores zero.
fn is_listed(path: &str, list: &[String]) -> usize {
    let mut best = 0;
    for entry in list {
        if entry == path {
            return entry.len();
        }
        if entry.len() >= best && in_directory(entry, path) {
            best = entry.len() + 1;
        }
    }
    best
}

/// Whether `path` lies inside `directory`. Prefix matches require a
/// separator boundary, so `/bar` does not contain `/barbaz/x`.
fn in_directory(directory: &str, path: &str) -> bool {
    if directory.is_empty() {
        return true;
    }
    path.len() > directory.len()
        && path.starts_with(directory)
        && path.as_bytes()[directory.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(whitelist: &[&str], blacklist: &[&str], extensions: &[&str]) -> PathFilter {
        let mut f = PathFilter::new();
        for dir in whitelist {
            f.add_whitelist(dir);
        }
        for dir in blacklist {
            f.add_blacklist(dir);
        }
        for ext in extensions {
            f.add_extension(ext);
        }
        f
    }

    #[test]
    fn empty_filter_matches_nothing() {
        assert!(!filter(&[], &[], &[]).test("/foo.txt"));
        assert!(!filter(&[], &[], &["txt"]).test("/foo.txt"));
        assert!(!filter(&[""], &[], &[]).test("/foo.txt"));
    }

    #[test]
    fn extension_gate_is_mandatory() {
        assert!(!filter(&[""], &[], &["rhai"]).test("/foo.txt"));
        assert!(filter(&[""], &[], &["txt"]).test("/foo.txt"));
        // No extension at all never matches.
        assert!(!filter(&[""], &[], &["txt"]).test("/foo/txt"));
        // Case-sensitive.
        assert!(!filter(&[""], &[], &["txt"]).test("/foo.TXT"));
    }

    #[test]
    fn blacklist_outranks_shallower_whitelist() {
        assert!(!filter(&[""], &["/bar"], &["txt"]).test("/bar/asd/foo.txt"));
    }

    #[test]
    fn longest_prefix_wins() {
        assert!(filter(&["", "/bar/asd"], &["/bar"], &["txt"]).test("/bar/asd/foo.txt"));
        assert!(filter(&["/bar/asd"], &["/bar"], &["txt"]).test("/bar/asd/foo.txt"));
        assert!(!filter(&["/bar"], &["/bar/asd"], &["txt"]).test("/bar/asd/foo.txt"));
    }

    #[test]
    fn equal_directory_scores_deny() {
        assert!(!filter(&["/bar"], &["/bar"], &["txt"]).test("/bar/asd/foo.txt"));
    }

    #[test]
    fn blacklist_entry_without_separator_boundary_is_ignored() {
        // "/bar/asd/foo" is not a directory containing "/bar/asd/foo.txt".
        assert!(filter(&["/bar/asd"], &["/bar/asd/foo"], &["txt"]).test("/bar/asd/foo.txt"));
    }

    #[test]
    fn prefix_requires_separator_boundary() {
        assert!(!filter(&["/bar"], &[], &["txt"]).test("/barbaz/x.txt"));
        assert!(filter(&["/bar"], &[], &["txt"]).test("/bar/x.txt"));
    }

    #[test]
    fn trailing_separators_are_trimmed() {
        assert!(filter(&["/foo/"], &[], &["rhai"]).test("/foo/bar.rhai"));
    }

    #[test]
    fn exact_match_tie_denies() {
        // A path listed verbatim on both sides scores equal on each, and
        // equal scores deny.
        let f = filter(&["/a/b.txt"], &["/a/b.txt"], &["txt"]);
        assert!(!f.test("/a/b.txt"));
    }

    #[test]
    fn exact_whitelist_match_beats_blacklist_prefix() {
        // Exact match short-circuits with the full entry length, which a
        // shallower blacklist directory cannot outscore.
        let f = filter(&["/a/b/c.txt"], &["/a"], &["txt"]);
        assert!(f.test("/a/b/c.txt"));
    }

    #[test]
    fn test_is_repeatable() {
        let f = filter(&["", "/bar/asd"], &["/bar"], &["txt"]);
        let first = f.test("/bar/asd/foo.txt");
        for _ in 0..10 {
            assert_eq!(f.test("/bar/asd/foo.txt"), first);
        }
    }

    #[test]
    fn defaults_cover_sources_and_bundles() {
        let mut f = PathFilter::with_defaults();
        f.add_whitelist("/srv");
        assert!(f.test("/srv/plugin.rhai"));
        assert!(f.test("/srv/bundle.zip"));
        assert!(!f.test("/srv/readme.md"));
    }

    #[test]
    fn from_config_round_trip() {
        let config: FilterConfig = serde_json::from_str(
            r#"{"whitelist": ["/srv/"], "blacklist": ["/srv/vendor"], "extensions": [".rhai"]}"#,
        )
        .unwrap();
        let f = PathFilter::from_config(&config);
        assert!(f.test("/srv/app.rhai"));
        assert!(!f.test("/srv/vendor/dep.rhai"));
    }
}
