//! Request and handle-surface types shared across drivers.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use crate::error::Error;

/// How a handle should be opened.
///
/// Mirrors `std::fs::OpenOptions`, plus a [`FromStr`] impl for the classic
/// `"r"` / `"r+"` / `"w"` / `"a"` / `"x"` mode strings spoken by host
/// runtimes that drive their loads through this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub create_new: bool,
}

impl OpenMode {
    /// Read-only, the mode used for load-purpose opens.
    pub fn read() -> Self {
        OpenMode {
            read: true,
            ..Default::default()
        }
    }

    /// Write-only, created and truncated.
    pub fn write() -> Self {
        OpenMode {
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// Read and write on an existing file.
    pub fn read_write() -> Self {
        OpenMode {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Append-only, created if missing.
    pub fn append() -> Self {
        OpenMode {
            write: true,
            append: true,
            create: true,
            ..Default::default()
        }
    }

    pub(crate) fn to_options(self) -> fs::OpenOptions {
        let mut options = fs::OpenOptions::new();
        options
            .read(self.read)
            .write(self.write)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);
        options
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self, Error> {
        // Binary/text qualifiers carry no meaning here.
        let base = mode.trim_end_matches(['b', 't']);
        let parsed = match base {
            "r" => OpenMode::read(),
            "r+" => OpenMode::read_write(),
            "w" => OpenMode::write(),
            "w+" => OpenMode {
                read: true,
                ..OpenMode::write()
            },
            "a" => OpenMode::append(),
            "a+" => OpenMode {
                read: true,
                ..OpenMode::append()
            },
            "x" => OpenMode {
                write: true,
                create_new: true,
                ..Default::default()
            },
            "x+" => OpenMode {
                read: true,
                write: true,
                create_new: true,
                ..Default::default()
            },
            "c" => OpenMode {
                write: true,
                create: true,
                ..Default::default()
            },
            "c+" => OpenMode {
                read: true,
                write: true,
                create: true,
                ..Default::default()
            },
            other => return Err(Error::invalid_option(format!("open mode `{other}`"))),
        };
        Ok(parsed)
    }
}

/// Context attached to an open request by the host runtime.
#[derive(Debug, Clone, Default)]
pub struct OpenContext {
    /// Whether this open initiates execution of the file's contents, as
    /// opposed to an ordinary data read. Only load-purpose opens consult
    /// the load hook.
    pub for_load: bool,
    /// The file that issued the load, when the host runtime knows it.
    /// Relative paths resolve against this file's directory.
    pub caller: Option<PathBuf>,
    /// Protocol-specific options, passed through to the underlying open.
    pub options: Option<HashMap<String, serde_json::Value>>,
}

impl OpenContext {
    /// Context for a load-purpose open.
    pub fn for_load() -> Self {
        OpenContext {
            for_load: true,
            ..Default::default()
        }
    }

    /// Attach the calling file's path.
    pub fn with_caller(mut self, caller: impl Into<PathBuf>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// File metadata as reported by `stat`-style operations.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub size: u64,
    pub is_file: bool,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
}

impl From<&fs::Metadata> for FileStat {
    fn from(meta: &fs::Metadata) -> Self {
        FileStat {
            size: meta.len(),
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            modified: meta.modified().ok(),
            created: meta.created().ok(),
        }
    }
}

impl FileStat {
    /// Metadata for a synthetic in-memory handle of `size` bytes.
    pub(crate) fn memory(size: u64) -> Self {
        FileStat {
            size,
            is_file: true,
            is_dir: false,
            modified: None,
            created: None,
        }
    }
}

/// Advisory lock operations on an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOp {
    Shared,
    Exclusive,
    Unlock,
}

/// Tunable options on an open handle.
///
/// `ReadTimeout` has no meaning for local resources and is rejected with
/// [`Error::InvalidOption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOption {
    Blocking(bool),
    ReadTimeout { seconds: u64, microseconds: u32 },
    WriteBuffer(usize),
    ReadBuffer(usize),
}

impl HandleOption {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            HandleOption::Blocking(_) => "blocking",
            HandleOption::ReadTimeout { .. } => "read_timeout",
            HandleOption::WriteBuffer(_) => "write_buffer",
            HandleOption::ReadBuffer(_) => "read_buffer",
        }
    }
}

/// Path-addressed metadata changes: touch, ownership, permissions.
///
/// Ownership changes take numeric ids; the name-based kinds exist so hosts
/// can express them, but resolving names needs a passwd lookup this layer
/// does not do, so they are rejected with [`Error::InvalidOption`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOp {
    /// Update modification/access times, or both to "now" when `None`.
    Touch(Option<(SystemTime, SystemTime)>),
    Owner(u32),
    OwnerName(String),
    Group(u32),
    GroupName(String),
    Permissions(u32),
}

impl MetadataOp {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            MetadataOp::Touch(_) => "touch",
            MetadataOp::Owner(_) => "owner",
            MetadataOp::OwnerName(_) => "owner_name",
            MetadataOp::Group(_) => "group",
            MetadataOp::GroupName(_) => "group_name",
            MetadataOp::Permissions(_) => "permissions",
        }
    }
}
