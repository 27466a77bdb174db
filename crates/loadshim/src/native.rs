//! Real-filesystem backends for the native protocols.
//!
//! `file` targets go straight to `std::fs`. `zip` targets are read-only
//! views into a zip container; entries decompress into memory at open time.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

use tracing::warn;

use crate::driver::Resource;
use crate::error::{Error, Result};
use crate::resolve::{self, FILE_PROTOCOL, ZIP_PROTOCOL};
use crate::types::{FileStat, MetadataOp, OpenContext, OpenMode};

fn unsupported(message: String) -> Error {
    io::Error::new(io::ErrorKind::Unsupported, message).into()
}

fn no_backend(scheme: &str) -> Error {
    unsupported(format!("no native handler for protocol `{scheme}`"))
}

/// Open `url` against the real filesystem. Context options are a
/// passthrough surface for layered handlers; the native backends take none.
pub fn open(url: &str, mode: OpenMode, _ctx: &OpenContext) -> Result<Resource> {
    let (scheme, path) = resolve::split(url);
    match scheme {
        FILE_PROTOCOL => Ok(Resource::File(mode.to_options().open(path)?)),
        ZIP_PROTOCOL => {
            if mode.write || mode.append || mode.truncate || mode.create || mode.create_new {
                return Err(unsupported("zip entries are read-only".to_string()));
            }
            Ok(Resource::memory_bytes(zip_entry(path)?))
        }
        other => Err(no_backend(other)),
    }
}

/// Open `url` as a directory listing snapshot.
pub fn open_dir(url: &str, _ctx: &OpenContext) -> Result<Resource> {
    let (scheme, path) = resolve::split(url);
    match scheme {
        FILE_PROTOCOL => {
            let mut entries = Vec::new();
            for entry in fs::read_dir(path)? {
                entries.push(entry?.file_name().to_string_lossy().into_owned());
            }
            Ok(Resource::dir(entries))
        }
        ZIP_PROTOCOL => Ok(Resource::dir(zip_dir(path)?)),
        other => Err(no_backend(other)),
    }
}

pub fn mkdir(url: &str, mode: u32, recursive: bool) -> Result<()> {
    let path = file_only(url, "mkdir")?;
    let mut builder = fs::DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(builder.create(path)?)
}

pub fn rmdir(url: &str) -> Result<()> {
    Ok(fs::remove_dir(file_only(url, "rmdir")?)?)
}

pub fn rename(from: &str, to: &str) -> Result<()> {
    Ok(fs::rename(file_only(from, "rename")?, file_only(to, "rename")?)?)
}

pub fn unlink(url: &str) -> Result<()> {
    Ok(fs::remove_file(file_only(url, "unlink")?)?)
}

/// Stat by path. Failures are returned as-is; `quiet` only suppresses the
/// warning-level diagnostic.
pub fn url_stat(url: &str, quiet: bool) -> Result<FileStat> {
    let (scheme, path) = resolve::split(url);
    let result = match scheme {
        FILE_PROTOCOL => fs::metadata(path)
            .map(|meta| FileStat::from(&meta))
            .map_err(Error::from),
        ZIP_PROTOCOL => zip_stat(path),
        other => Err(no_backend(other)),
    };
    if let Err(err) = &result {
        if !quiet {
            warn!("stat failed for {url}: {err}");
        }
    }
    result
}

pub fn set_metadata(url: &str, op: MetadataOp) -> Result<()> {
    let path = file_only(url, op.kind())?;
    match op {
        MetadataOp::Touch(times) => touch(Path::new(path), times),
        #[cfg(unix)]
        MetadataOp::Owner(uid) => Ok(std::os::unix::fs::chown(path, Some(uid), None)?),
        #[cfg(unix)]
        MetadataOp::Group(gid) => Ok(std::os::unix::fs::chown(path, None, Some(gid))?),
        #[cfg(unix)]
        MetadataOp::Permissions(mode) => {
            use std::os::unix::fs::PermissionsExt;
            Ok(fs::set_permissions(path, fs::Permissions::from_mode(mode))?)
        }
        // Name-based ownership needs a passwd lookup this layer does not do.
        other => Err(Error::invalid_option(other.kind())),
    }
}

fn touch(path: &Path, times: Option<(SystemTime, SystemTime)>) -> Result<()> {
    let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    let (modified, accessed) = times.unwrap_or_else(|| {
        let now = SystemTime::now();
        (now, now)
    });
    let times = fs::FileTimes::new().set_modified(modified).set_accessed(accessed);
    Ok(file.set_times(times)?)
}

fn file_only<'a>(url: &'a str, operation: &str) -> Result<&'a str> {
    let (scheme, path) = resolve::split(url);
    match scheme {
        FILE_PROTOCOL => Ok(path),
        ZIP_PROTOCOL => Err(unsupported(format!(
            "{operation} is not supported inside zip archives"
        ))),
        other => Err(no_backend(other)),
    }
}

fn open_archive(path: &str) -> Result<(zip::ZipArchive<fs::File>, &str)> {
    let (container, inner) = resolve::split_archive(path).ok_or_else(|| {
        Error::from(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a zip target: {path}"),
        ))
    })?;
    let file = fs::File::open(container)?;
    let archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
    Ok((archive, inner.trim_start_matches('/')))
}

/// Decompress a single entry into memory.
fn zip_entry(path: &str) -> Result<Vec<u8>> {
    let (mut archive, inner) = open_archive(path)?;
    let mut entry = archive
        .by_name(inner)
        .map_err(|err| io::Error::new(io::ErrorKind::NotFound, err.to_string()))?;
    let mut content = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut content)?;
    Ok(content)
}

/// Immediate children of a directory inside the container.
fn zip_dir(path: &str) -> Result<Vec<String>> {
    let (archive, inner) = open_archive(path)?;
    let prefix = if inner.is_empty() {
        String::new()
    } else {
        format!("{inner}/")
    };
    let mut entries: Vec<String> = Vec::new();
    for name in archive.file_names() {
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        let Some(child) = rest.split('/').next().filter(|c| !c.is_empty()) else {
            continue;
        };
        if !entries.iter().any(|e| e == child) {
            entries.push(child.to_string());
        }
    }
    if entries.is_empty() && !inner.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such directory in archive: {inner}"),
        )
        .into());
    }
    Ok(entries)
}

fn zip_stat(path: &str) -> Result<FileStat> {
    let (mut archive, inner) = open_archive(path)?;
    if inner.is_empty() {
        // The container root is a directory.
        return Ok(FileStat {
            size: 0,
            is_file: false,
            is_dir: true,
            modified: None,
            created: None,
        });
    }
    let entry_size = match archive.by_name(inner) {
        Ok(entry) => Some(entry.size()),
        Err(_) => None,
    };
    if let Some(size) = entry_size {
        return Ok(FileStat {
            size,
            is_file: true,
            is_dir: false,
            modified: None,
            created: None,
        });
    }
    let prefix = format!("{inner}/");
    if archive.file_names().any(|name| name.starts_with(&prefix)) {
        Ok(FileStat {
            size: 0,
            is_file: false,
            is_dir: true,
            modified: None,
            created: None,
        })
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such entry in archive: {inner}"),
        )
        .into())
    }
}
