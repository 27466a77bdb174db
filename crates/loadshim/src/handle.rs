//! The intercepting file handle and the public handle wrappers.

use std::io::{self, SeekFrom};
use std::sync::Arc;

use tracing::debug;

use crate::driver::{DriverState, FileDriver, Resource};
use crate::error::{Error, Result};
use crate::interceptor::{Interceptor, ReentrancyGuard};
use crate::resolve;
use crate::types::{FileStat, HandleOption, LockOp, MetadataOp, OpenContext, OpenMode};

/// Per-open handle of a bound interceptor.
///
/// Overrides the open-for-load path to consult the load hook; every other
/// operation is either a plain forward to the owned resource (handle-state
/// operations) or a reentrancy-guarded re-dispatch through the registry
/// (path-addressed operations), so that the next handler down the stack —
/// usually the native passthrough — serves the real filesystem work.
pub struct VirtualFileHandle {
    interceptor: Arc<Interceptor>,
    state: DriverState,
}

impl VirtualFileHandle {
    pub(crate) fn new(interceptor: Arc<Interceptor>) -> Self {
        VirtualFileHandle {
            interceptor,
            state: DriverState::default(),
        }
    }

    fn forwarded(driver: Box<dyn FileDriver>) -> Resource {
        Resource::Forwarded(driver)
    }
}

impl FileDriver for VirtualFileHandle {
    fn state(&mut self) -> &mut DriverState {
        &mut self.state
    }

    fn open(&mut self, url: &str, mode: OpenMode, ctx: &OpenContext) -> Result<()> {
        // The whole open runs unregistered: the hook may read files, and
        // the fallback open must reach the handler below this one.
        let _guard = ReentrancyGuard::new(&self.interceptor);
        let url = resolve::fix_relative(url, ctx.caller.as_deref());

        if ctx.for_load {
            if let Ok(canonical) = resolve::canonicalize(&url) {
                match self.interceptor.hook().load(&canonical) {
                    Ok(Some(content)) => {
                        debug!("substituting load content for {canonical}");
                        self.state.resource = Some(Resource::memory(content));
                        return Ok(());
                    }
                    Ok(None) => {}
                    Err(err) => return Err(Error::Hook(err)),
                }
            }
        }

        // Hook declined, or not a load-purpose open: real open of the
        // original (non-canonicalized) path.
        let handle = self.interceptor.registry().open(&url, mode, ctx)?;
        self.state.resource = Some(Self::forwarded(handle.into_driver()));
        Ok(())
    }

    fn open_dir(&mut self, url: &str, ctx: &OpenContext) -> Result<()> {
        let _guard = ReentrancyGuard::new(&self.interceptor);
        let handle = self.interceptor.registry().open_dir(url, ctx)?;
        self.state.resource = Some(Self::forwarded(handle.into_driver()));
        Ok(())
    }

    fn mkdir(&mut self, url: &str, mode: u32, recursive: bool) -> Result<()> {
        let _guard = ReentrancyGuard::new(&self.interceptor);
        self.interceptor.registry().mkdir(url, mode, recursive)
    }

    fn rmdir(&mut self, url: &str) -> Result<()> {
        let _guard = ReentrancyGuard::new(&self.interceptor);
        self.interceptor.registry().rmdir(url)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let _guard = ReentrancyGuard::new(&self.interceptor);
        self.interceptor.registry().rename(from, to)
    }

    fn unlink(&mut self, url: &str) -> Result<()> {
        let _guard = ReentrancyGuard::new(&self.interceptor);
        self.interceptor.registry().unlink(url)
    }

    fn url_stat(&mut self, url: &str, quiet: bool) -> Result<FileStat> {
        let _guard = ReentrancyGuard::new(&self.interceptor);
        self.interceptor.registry().stat(url, quiet)
    }

    fn set_metadata(&mut self, url: &str, op: MetadataOp) -> Result<()> {
        let _guard = ReentrancyGuard::new(&self.interceptor);
        self.interceptor.registry().set_metadata(url, op)
    }
}

/// An open file handle returned by the dispatch layer.
///
/// Handle-state operations go straight to the underlying resource — they
/// never re-enter protocol dispatch. Byte I/O is exposed through the
/// standard `Read`/`Write`/`Seek` traits.
pub struct FileHandle {
    driver: Box<dyn FileDriver>,
}

impl FileHandle {
    pub(crate) fn new(driver: Box<dyn FileDriver>) -> Self {
        FileHandle { driver }
    }

    pub(crate) fn into_driver(self) -> Box<dyn FileDriver> {
        self.driver
    }

    /// Whether a previous read hit end-of-file.
    pub fn eof(&mut self) -> Result<bool> {
        self.driver.eof()
    }

    /// Current read/write position.
    pub fn tell(&mut self) -> Result<u64> {
        self.driver.tell()
    }

    /// Metadata of the open resource.
    pub fn stat(&mut self) -> Result<FileStat> {
        self.driver.stat()
    }

    /// Truncate or zero-extend to `size` bytes.
    pub fn truncate(&mut self, size: u64) -> Result<()> {
        self.driver.truncate(size)
    }

    /// Advisory locking on the underlying file.
    pub fn lock(&mut self, op: LockOp) -> Result<()> {
        self.driver.lock(op)
    }

    /// Tune the handle; unsupported kinds fail with
    /// [`Error::InvalidOption`].
    pub fn set_option(&mut self, option: HandleOption) -> Result<()> {
        self.driver.set_option(option)
    }

    /// Close explicitly. Dropping the handle closes it too; this form
    /// surfaces errors.
    pub fn close(mut self) -> Result<()> {
        self.driver.close()
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle").finish_non_exhaustive()
    }
}

impl io::Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.driver.read(buf).map_err(io::Error::from)
    }
}

impl io::Write for FileHandle {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.driver.write(data).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.driver.flush().map_err(io::Error::from)
    }
}

impl io::Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.driver.seek(pos).map_err(io::Error::from)
    }
}

/// An open directory listing returned by the dispatch layer.
pub struct DirHandle {
    driver: Box<dyn FileDriver>,
}

impl DirHandle {
    pub(crate) fn new(driver: Box<dyn FileDriver>) -> Self {
        DirHandle { driver }
    }

    pub(crate) fn into_driver(self) -> Box<dyn FileDriver> {
        self.driver
    }

    /// Next entry name, or `None` at the end of the listing.
    pub fn read(&mut self) -> Result<Option<String>> {
        self.driver.read_dir()
    }

    /// Restart the listing from the beginning.
    pub fn rewind(&mut self) -> Result<()> {
        self.driver.rewind_dir()
    }

    pub fn close(mut self) -> Result<()> {
        self.driver.close()
    }
}
