//! Path resolution: caller-relative fixup and archive-aware
//! canonicalization.
//!
//! Targets are URL strings, `scheme://rest`, with bare paths treated as the
//! `file` protocol. Canonicalization must succeed for paths inside zip
//! containers too, where `fs::canonicalize` does not apply: the container
//! part resolves through the OS primitive and the inner part is collapsed
//! manually.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Protocol name of the local filesystem.
pub const FILE_PROTOCOL: &str = "file";
/// Protocol name of the zip-archive virtual filesystem.
pub const ZIP_PROTOCOL: &str = "zip";

/// Split a target into `(protocol, path)`. Bare paths are `file`.
pub(crate) fn split(url: &str) -> (&str, &str) {
    match url.split_once("://") {
        Some((scheme, path)) if !scheme.is_empty() => (scheme, path),
        _ => (FILE_PROTOCOL, url),
    }
}

/// Protocol name of a target.
pub(crate) fn scheme_of(url: &str) -> &str {
    split(url).0
}

/// Resolve a relative path against the directory of the file that issued
/// the load, but only if the resulting candidate actually exists. Targets
/// with an explicit protocol and absolute paths are left unchanged.
pub(crate) fn fix_relative(url: &str, caller: Option<&Path>) -> String {
    if url.contains("://") || Path::new(url).is_absolute() {
        return url.to_string();
    }
    let Some(caller_dir) = caller.and_then(Path::parent) else {
        return url.to_string();
    };
    let candidate = caller_dir.join(url);
    if candidate.exists() {
        candidate.to_string_lossy().into_owned()
    } else {
        url.to_string()
    }
}

/// Canonicalize a target to its absolute form.
///
/// `file` targets resolve through `fs::canonicalize` and come back as bare
/// absolute paths. `zip` targets come back as `zip://<container>/<inner>`
/// with the container canonicalized and `.`/`..` collapsed out of the inner
/// path. Returns [`Error::NotFound`] when the target does not resolve to an
/// existing file; load-purpose opens fall back to the plain open path on
/// that error.
pub fn canonicalize(url: &str) -> Result<String> {
    let (scheme, path) = split(url);
    match scheme {
        FILE_PROTOCOL => fs::canonicalize(path)
            .map(|p| p.to_string_lossy().into_owned())
            .map_err(|_| Error::NotFound(url.to_string())),
        ZIP_PROTOCOL => canonicalize_archive(path)
            .map(|resolved| format!("{ZIP_PROTOCOL}://{resolved}"))
            .ok_or_else(|| Error::NotFound(url.to_string())),
        _ => Err(Error::NotFound(url.to_string())),
    }
}

fn canonicalize_archive(path: &str) -> Option<String> {
    let (container, inner) = split_archive(path)?;
    let container = fs::canonicalize(container).ok()?;
    let inner = collapse_dots(inner);
    if !archive_contains(&container, &inner) {
        return None;
    }
    Some(format!("{}{}", container.to_string_lossy(), inner))
}

/// Split an archive target into `(container, inner)` at the `.zip`
/// boundary. The inner part keeps its leading separator and may be empty
/// when the target is the container itself.
pub(crate) fn split_archive(path: &str) -> Option<(&str, &str)> {
    if let Some(end) = path.find(".zip/") {
        let boundary = end + ".zip".len();
        Some((&path[..boundary], &path[boundary..]))
    } else if path.ends_with(".zip") {
        Some((path, ""))
    } else {
        None
    }
}

/// Collapse `.` and `..` segments by left-to-right stack reduction: `..`
/// pops the last retained segment, `.` is dropped, anything else is pushed.
pub(crate) fn collapse_dots(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Whether `inner` names an entry, or a directory of entries, in the zip
/// container. An empty inner path is the container itself.
pub(crate) fn archive_contains(container: &Path, inner: &str) -> bool {
    let inner = inner.trim_start_matches('/');
    if inner.is_empty() {
        return true;
    }
    let Ok(file) = fs::File::open(container) else {
        return false;
    };
    let Ok(archive) = zip::ZipArchive::new(file) else {
        return false;
    };
    let dir_prefix = format!("{inner}/");
    archive
        .file_names()
        .any(|name| name == inner || name == dir_prefix || name.starts_with(&dir_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn collapse_drops_dot_and_pops_dotdot() {
        assert_eq!(collapse_dots("./a/../b/c"), "b/c");
        assert_eq!(collapse_dots("/a/./b"), "/a/b");
        assert_eq!(collapse_dots("/a/b/../../c"), "/c");
        assert_eq!(collapse_dots("a/b"), "a/b");
    }

    #[test]
    fn split_detects_the_container_boundary() {
        assert_eq!(
            split_archive("/srv/bundle.zip/lib/app.rhai"),
            Some(("/srv/bundle.zip", "/lib/app.rhai"))
        );
        assert_eq!(split_archive("/srv/bundle.zip"), Some(("/srv/bundle.zip", "")));
        assert_eq!(split_archive("/srv/bundle.tar"), None);
    }

    #[test]
    fn bare_and_prefixed_targets_split() {
        assert_eq!(split("/srv/app.rhai"), ("file", "/srv/app.rhai"));
        assert_eq!(split("zip:///srv/b.zip/x"), ("zip", "/srv/b.zip/x"));
        assert_eq!(scheme_of("zip:///srv/b.zip"), "zip");
    }

    #[test]
    fn relative_paths_resolve_against_the_caller() {
        let dir = tempdir().unwrap();
        let caller = dir.path().join("loader.rhai");
        let sibling = dir.path().join("dep.rhai");
        std::fs::write(&sibling, "x").unwrap();

        let fixed = fix_relative("dep.rhai", Some(&caller));
        assert_eq!(fixed, sibling.to_string_lossy());

        // Candidate that does not exist leaves the path unchanged.
        assert_eq!(fix_relative("ghost.rhai", Some(&caller)), "ghost.rhai");
        // Absolute paths are never rewritten.
        let absolute = sibling.to_string_lossy().into_owned();
        assert_eq!(fix_relative(&absolute, Some(&caller)), absolute);
    }

    #[test]
    fn canonicalize_resolves_inside_archives() {
        let dir = tempdir().unwrap();
        let container = dir.path().join("bundle.zip");
        let file = std::fs::File::create(&container).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("lib/app.rhai", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"fn main() {}").unwrap();
        writer.finish().unwrap();

        let url = format!("zip://{}/lib/../lib/./app.rhai", container.display());
        let canonical = canonicalize(&url).unwrap();
        let expected = format!(
            "zip://{}/lib/app.rhai",
            std::fs::canonicalize(&container).unwrap().display()
        );
        assert_eq!(canonical, expected);

        // Directory entries resolve too.
        let dir_url = format!("zip://{}/lib", container.display());
        assert!(canonicalize(&dir_url).is_ok());

        // Missing entries do not.
        let missing = format!("zip://{}/lib/ghost.rhai", container.display());
        assert!(matches!(canonicalize(&missing), Err(Error::NotFound(_))));
    }

    #[test]
    fn canonicalize_fails_gracefully_without_a_container() {
        let err = canonicalize("zip:///no/such/bundle.zip/inner.rhai");
        assert!(matches!(err, Err(Error::NotFound(_))));
        let err = canonicalize("/no/such/file.rhai");
        assert!(matches!(err, Err(Error::NotFound(_))));
    }
}
