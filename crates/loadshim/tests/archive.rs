//! The zip-backed virtual filesystem: resolution, reads, and limits.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use loadshim::{Error, Interceptor, OpenContext, OpenMode, Registry};
use tempfile::{TempDir, tempdir};

fn decline(_path: &str) -> anyhow::Result<Option<String>> {
    Ok(None)
}

fn protocols() -> Vec<String> {
    vec!["file".to_string(), "zip".to_string()]
}

/// A container with a couple of entries under `lib/`.
fn fixture() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let container = dir.path().join("bundle.zip");
    let file = fs::File::create(&container).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("lib/app.rhai", options).unwrap();
    writer.write_all(b"bundled app").unwrap();
    writer.start_file("lib/util.rhai", options).unwrap();
    writer.write_all(b"bundled util").unwrap();
    writer.start_file("manifest.txt", options).unwrap();
    writer.write_all(b"v1").unwrap();
    writer.finish().unwrap();
    (dir, container)
}

fn zip_url(container: &Path, inner: &str) -> String {
    format!("zip://{}{}", container.display(), inner)
}

#[test]
fn entries_read_through_the_layer() {
    let (_dir, container) = fixture();
    let registry = Arc::new(Registry::new());
    let interceptor = Interceptor::with_registry(decline, protocols(), Arc::clone(&registry));
    interceptor.wrap();

    let mut handle = registry
        .open(
            &zip_url(&container, "/lib/app.rhai"),
            OpenMode::read(),
            &OpenContext::default(),
        )
        .unwrap();
    let mut content = String::new();
    handle.read_to_string(&mut content).unwrap();
    assert_eq!(content, "bundled app");
}

#[test]
fn dotted_inner_paths_resolve_for_loads() {
    let (_dir, container) = fixture();
    let seen = Arc::new(Mutex::new(None::<String>));
    let sink = Arc::clone(&seen);

    let registry = Arc::new(Registry::new());
    let interceptor = Interceptor::with_registry(
        move |path: &str| -> anyhow::Result<Option<String>> {
            *sink.lock().unwrap() = Some(path.to_string());
            Ok(Some("patched bundle".to_string()))
        },
        protocols(),
        Arc::clone(&registry),
    );
    interceptor.wrap();

    let dotted = zip_url(&container, "/lib/./../lib/app.rhai");
    let mut handle = registry
        .open(&dotted, OpenMode::read(), &OpenContext::for_load())
        .unwrap();
    let mut content = String::new();
    handle.read_to_string(&mut content).unwrap();
    assert_eq!(content, "patched bundle");

    // The hook saw the canonical zip target with dots collapsed.
    let canonical_container = fs::canonicalize(&container).unwrap();
    assert_eq!(
        seen.lock().unwrap().as_deref(),
        Some(zip_url(&canonical_container, "/lib/app.rhai").as_str())
    );
}

#[test]
fn missing_container_falls_back_gracefully() {
    let registry = Arc::new(Registry::new());
    let interceptor = Interceptor::with_registry(
        |_path: &str| -> anyhow::Result<Option<String>> { Ok(Some("patched".to_string())) },
        protocols(),
        Arc::clone(&registry),
    );
    interceptor.wrap();

    // Canonicalization fails (no container on disk), so the hook is never
    // consulted and the plain open reports the underlying failure.
    let err = registry
        .open(
            "zip:///no/such/bundle.zip/lib/app.rhai",
            OpenMode::read(),
            &OpenContext::for_load(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(registry.handler_for("zip").is_some());
}

#[test]
fn directory_listing_inside_the_container() {
    let (_dir, container) = fixture();
    let registry = Arc::new(Registry::new());
    let interceptor = Interceptor::with_registry(decline, protocols(), Arc::clone(&registry));
    interceptor.wrap();

    let mut listing = registry
        .open_dir(&zip_url(&container, "/lib"), &OpenContext::default())
        .unwrap();
    let mut names = Vec::new();
    while let Some(name) = listing.read().unwrap() {
        names.push(name);
    }
    names.sort();
    assert_eq!(names, vec!["app.rhai", "util.rhai"]);

    // Root listing shows immediate children only.
    let mut listing = registry
        .open_dir(&zip_url(&container, ""), &OpenContext::default())
        .unwrap();
    let mut names = Vec::new();
    while let Some(name) = listing.read().unwrap() {
        names.push(name);
    }
    names.sort();
    assert_eq!(names, vec!["lib", "manifest.txt"]);
}

#[test]
fn stat_distinguishes_entries_and_directories() {
    let (_dir, container) = fixture();
    let registry = Arc::new(Registry::new());
    let interceptor = Interceptor::with_registry(decline, protocols(), Arc::clone(&registry));
    interceptor.wrap();

    let stat = registry
        .stat(&zip_url(&container, "/lib/app.rhai"), false)
        .unwrap();
    assert!(stat.is_file);
    assert_eq!(stat.size, "bundled app".len() as u64);

    let stat = registry.stat(&zip_url(&container, "/lib"), true).unwrap();
    assert!(stat.is_dir);

    let err = registry
        .stat(&zip_url(&container, "/lib/ghost.rhai"), true)
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn archives_are_read_only() {
    let (_dir, container) = fixture();
    let registry = Arc::new(Registry::new());
    let interceptor = Interceptor::with_registry(decline, protocols(), Arc::clone(&registry));
    interceptor.wrap();

    let url = zip_url(&container, "/lib/app.rhai");
    let err = registry
        .open(&url, OpenMode::write(), &OpenContext::default())
        .unwrap_err();
    match err {
        Error::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::Unsupported),
        other => panic!("expected an I/O error, got {other}"),
    }

    let err = registry.unlink(&url).unwrap_err();
    match err {
        Error::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::Unsupported),
        other => panic!("expected an I/O error, got {other}"),
    }

    let err = registry
        .mkdir(&zip_url(&container, "/newdir"), 0o755, false)
        .unwrap_err();
    match err {
        Error::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::Unsupported),
        other => panic!("expected an I/O error, got {other}"),
    }
}
