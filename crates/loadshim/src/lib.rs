//! Load-time file interception.
//!
//! A host runtime drives its file access through [`Registry`] dispatch;
//! when an [`Interceptor`] is bound, opens flagged as load-purpose consult
//! a [`LoadHook`] that may substitute transformed content for the file
//! being loaded. Everything else — reads, writes, seeks, stats, directory
//! traversal, renames — passes through to the real filesystem untouched,
//! with a reentrancy guard keeping forwarded calls from re-entering the
//! layer.
//!
//! The filter deciding which paths to intercept is [`PathFilter`]; compose
//! it with a hook via [`hook::Filtered`]. Paths are `scheme://path` targets
//! (bare paths mean the local filesystem); `zip://container.zip/inner`
//! reaches inside archives the OS cannot canonicalize natively.
//!
//! This layer is a routing convenience, not a security boundary: hooks
//! transform what a cooperative host loads, nothing more.

pub mod driver;
pub mod error;
pub mod filter;
pub mod handle;
pub mod hook;
pub mod interceptor;
mod native;
pub mod registry;
pub mod resolve;
pub mod types;

pub use error::{Error, Result};
pub use filter::{DEFAULT_EXTENSIONS, FilterConfig, PathFilter};
pub use handle::{DirHandle, FileHandle};
pub use hook::LoadHook;
pub use interceptor::{DEFAULT_PROTOCOLS, Interceptor, ReentrancyGuard};
pub use registry::Registry;
pub use resolve::{FILE_PROTOCOL, ZIP_PROTOCOL, canonicalize};
pub use types::{FileStat, HandleOption, LockOp, MetadataOp, OpenContext, OpenMode};
