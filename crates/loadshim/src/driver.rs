//! The file-driver contract bound to a protocol.
//!
//! One method per filesystem operation, with default implementations that
//! delegate to the real filesystem. A driver instance is
//! ephemeral: the dispatch layer creates one per open call, and it owns at
//! most one underlying resource for its lifetime. Interception overrides
//! only the operations it needs (see [`crate::handle::VirtualFileHandle`]);
//! everything else inherits the passthrough.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::native;
use crate::types::{FileStat, HandleOption, LockOp, MetadataOp, OpenContext, OpenMode};

/// The underlying resource owned by an open driver.
pub enum Resource {
    /// A real file on the local filesystem.
    File(std::fs::File),
    /// An in-memory buffer: synthetic hook content or a zip entry.
    Memory(Cursor<Vec<u8>>),
    /// A directory listing snapshot with a read position.
    Dir(DirEntries),
    /// A handle served by the next handler down the protocol stack.
    Forwarded(Box<dyn FileDriver>),
}

impl Resource {
    pub(crate) fn memory(content: String) -> Self {
        Resource::memory_bytes(content.into_bytes())
    }

    pub(crate) fn memory_bytes(content: Vec<u8>) -> Self {
        Resource::Memory(Cursor::new(content))
    }

    pub(crate) fn dir(entries: Vec<String>) -> Self {
        Resource::Dir(DirEntries { entries, pos: 0 })
    }
}

/// Directory entries captured at open time.
pub struct DirEntries {
    entries: Vec<String>,
    pos: usize,
}

impl DirEntries {
    fn next(&mut self) -> Option<String> {
        let entry = self.entries.get(self.pos).cloned();
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }
}

/// Per-open state shared by the default [`FileDriver`] implementations.
#[derive(Default)]
pub struct DriverState {
    pub(crate) resource: Option<Resource>,
    pub(crate) eof: bool,
}

impl DriverState {
    fn resource_mut(&mut self) -> Result<&mut Resource> {
        self.resource
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "handle is not open").into())
    }
}

fn not_a_file() -> Error {
    io::Error::new(io::ErrorKind::InvalidInput, "handle is not a file").into()
}

fn not_a_dir() -> Error {
    io::Error::new(io::ErrorKind::InvalidInput, "handle is not a directory").into()
}

/// Contract a bound protocol handler implements, mirroring the host
/// runtime's file-driver surface. Defaults are a faithful passthrough to
/// the real filesystem.
pub trait FileDriver: Send {
    /// Per-open state backing the default implementations.
    fn state(&mut self) -> &mut DriverState;

    /// Open `url` and take ownership of the resulting resource.
    fn open(&mut self, url: &str, mode: OpenMode, ctx: &OpenContext) -> Result<()> {
        let resource = native::open(url, mode, ctx)?;
        self.state().resource = Some(resource);
        Ok(())
    }

    /// Release the underlying resource.
    fn close(&mut self) -> Result<()> {
        self.state().resource = None;
        Ok(())
    }

    /// Whether a previous read hit end-of-file.
    fn eof(&mut self) -> Result<bool> {
        Ok(self.state().eof)
    }

    fn flush(&mut self) -> Result<()> {
        match self.state().resource_mut()? {
            Resource::File(file) => Ok(file.flush()?),
            Resource::Memory(_) => Ok(()),
            Resource::Forwarded(inner) => inner.flush(),
            Resource::Dir(_) => Err(not_a_file()),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let state = self.state();
        let n = match state.resource_mut()? {
            Resource::File(file) => file.read(buf)?,
            Resource::Memory(cursor) => cursor.read(buf)?,
            Resource::Forwarded(inner) => inner.read(buf)?,
            Resource::Dir(_) => return Err(not_a_file()),
        };
        if n == 0 && !buf.is_empty() {
            state.eof = true;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self.state().resource_mut()? {
            Resource::File(file) => Ok(file.write(data)?),
            Resource::Memory(cursor) => Ok(cursor.write(data)?),
            Resource::Forwarded(inner) => inner.write(data),
            Resource::Dir(_) => Err(not_a_file()),
        }
    }

    /// Seek also clears the end-of-file flag, like the host runtimes expect.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let state = self.state();
        let offset = match state.resource_mut()? {
            Resource::File(file) => file.seek(pos)?,
            Resource::Memory(cursor) => cursor.seek(pos)?,
            Resource::Forwarded(inner) => inner.seek(pos)?,
            Resource::Dir(_) => return Err(not_a_file()),
        };
        state.eof = false;
        Ok(offset)
    }

    fn tell(&mut self) -> Result<u64> {
        match self.state().resource_mut()? {
            Resource::File(file) => Ok(file.stream_position()?),
            Resource::Memory(cursor) => Ok(cursor.position()),
            Resource::Forwarded(inner) => inner.tell(),
            Resource::Dir(_) => Err(not_a_file()),
        }
    }

    fn stat(&mut self) -> Result<FileStat> {
        match self.state().resource_mut()? {
            Resource::File(file) => Ok(FileStat::from(&file.metadata()?)),
            Resource::Memory(cursor) => Ok(FileStat::memory(cursor.get_ref().len() as u64)),
            Resource::Forwarded(inner) => inner.stat(),
            Resource::Dir(_) => Err(not_a_file()),
        }
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        match self.state().resource_mut()? {
            Resource::File(file) => Ok(file.set_len(size)?),
            Resource::Memory(cursor) => {
                cursor.get_mut().resize(size as usize, 0);
                Ok(())
            }
            Resource::Forwarded(inner) => inner.truncate(size),
            Resource::Dir(_) => Err(not_a_file()),
        }
    }

    fn lock(&mut self, op: LockOp) -> Result<()> {
        match self.state().resource_mut()? {
            Resource::File(file) => {
                match op {
                    LockOp::Shared => file.lock_shared()?,
                    LockOp::Exclusive => file.lock()?,
                    LockOp::Unlock => file.unlock()?,
                }
                Ok(())
            }
            // Nothing contends for a private buffer; locking it succeeds.
            Resource::Memory(_) => Ok(()),
            Resource::Forwarded(inner) => inner.lock(op),
            Resource::Dir(_) => Err(not_a_file()),
        }
    }

    fn set_option(&mut self, option: HandleOption) -> Result<()> {
        match self.state().resource_mut()? {
            Resource::Forwarded(inner) => inner.set_option(option),
            Resource::Dir(_) => Err(not_a_file()),
            _ => match option {
                // Local resources are always blocking and unbuffered at
                // this layer; accepting these keeps callers portable.
                HandleOption::Blocking(_)
                | HandleOption::WriteBuffer(_)
                | HandleOption::ReadBuffer(_) => Ok(()),
                HandleOption::ReadTimeout { .. } => Err(Error::invalid_option(option.kind())),
            },
        }
    }

    /// Stat by path, without an open handle. `quiet` suppresses the
    /// warning-level diagnostic on failure; the failure itself is still
    /// returned.
    fn url_stat(&mut self, url: &str, quiet: bool) -> Result<FileStat> {
        native::url_stat(url, quiet)
    }

    /// Open `url` as a directory listing.
    fn open_dir(&mut self, url: &str, ctx: &OpenContext) -> Result<()> {
        let resource = native::open_dir(url, ctx)?;
        self.state().resource = Some(resource);
        Ok(())
    }

    /// Next directory entry name, or `None` at the end of the listing.
    fn read_dir(&mut self) -> Result<Option<String>> {
        match self.state().resource_mut()? {
            Resource::Dir(entries) => Ok(entries.next()),
            Resource::Forwarded(inner) => inner.read_dir(),
            _ => Err(not_a_dir()),
        }
    }

    fn rewind_dir(&mut self) -> Result<()> {
        match self.state().resource_mut()? {
            Resource::Dir(entries) => {
                entries.rewind();
                Ok(())
            }
            Resource::Forwarded(inner) => inner.rewind_dir(),
            _ => Err(not_a_dir()),
        }
    }

    fn mkdir(&mut self, url: &str, mode: u32, recursive: bool) -> Result<()> {
        native::mkdir(url, mode, recursive)
    }

    fn rmdir(&mut self, url: &str) -> Result<()> {
        native::rmdir(url)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        native::rename(from, to)
    }

    fn unlink(&mut self, url: &str) -> Result<()> {
        native::unlink(url)
    }

    fn set_metadata(&mut self, url: &str, op: MetadataOp) -> Result<()> {
        native::set_metadata(url, op)
    }
}

/// The all-defaults driver: every operation is a direct passthrough to the
/// real filesystem.
#[derive(Default)]
pub struct NativeDriver {
    state: DriverState,
}

impl NativeDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileDriver for NativeDriver {
    fn state(&mut self) -> &mut DriverState {
        &mut self.state
    }
}
