//! Zero-filling data source.
//!
//! The zero strategy streams its body from a character device that yields
//! zero bytes for any read. The device is opened read-only once per request
//! and wrapped in a [`DeviceHandle`] with a single owner: the request context
//! until headers are sent, then the response body. Success, early failure,
//! header-only responses and client aborts all end with that owner being
//! dropped, so the handle is released exactly once on every exit path.

use crate::{Error, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// Default zero-filling device.
pub const DEV_ZERO: &str = "/dev/zero";

/// Callback invoked once when a device handle is closed.
pub type ReleaseHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// Opens zero-filling sources.
pub trait ZeroSource: Send + Sync {
    fn open(&self) -> Result<DeviceHandle>;
}

/// An open, read-only zero device.
pub struct DeviceHandle {
    file: File,
    path: PathBuf,
    on_release: Option<ReleaseHook>,
}

impl DeviceHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll a read from the device into `buf`.
    ///
    /// The device is position independent, so windowing is done by the
    /// caller purely through lengths. The read runs on tokio's blocking pool.
    pub fn poll_read_into(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.path)
            .field("on_release", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "Closing zero source");
        if let Some(hook) = self.on_release.take() {
            hook(&self.path);
        }
    }
}

/// A character device opened with `O_RDONLY`, `/dev/zero` by default.
#[derive(Clone)]
pub struct DevZero {
    path: PathBuf,
    on_release: Option<ReleaseHook>,
}

impl DevZero {
    pub fn new() -> Self {
        Self::with_path(DEV_ZERO)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            on_release: None,
        }
    }

    /// Run `hook` each time a handle opened by this source is closed.
    pub fn on_release(mut self, hook: ReleaseHook) -> Self {
        self.on_release = Some(hook);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for DevZero {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DevZero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevZero").field("path", &self.path).finish()
    }
}

impl ZeroSource for DevZero {
    fn open(&self) -> Result<DeviceHandle> {
        let file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|source| Error::DeviceOpenFailure {
                path: self.path.display().to_string(),
                source,
            })?;

        tracing::debug!(path = %self.path.display(), "Opened zero source");

        Ok(DeviceHandle {
            file: File::from_std(file),
            path: self.path.clone(),
            on_release: self.on_release.clone(),
        })
    }
}
