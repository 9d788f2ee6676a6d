//! Scoped scratch files and directories.
//!
//! Tools such as pdfium, mineru and tesseract want filesystem paths, not byte
//! buffers. Every engine therefore bridges through a scratch resource that
//! lives exactly as long as one request.
//!
//! [`ScratchManager::scoped`] is the only way engines use these resources:
//! it acquires, runs the body, and releases on every exit path (success,
//! error, or panic) before control returns. Release failures are logged and
//! swallowed; they never replace the body's outcome. Names carry a random
//! component from `tempfile`, so concurrent processes sharing one scratch
//! root never collide.

use crate::error::ConversionError;
use futures::FutureExt;
use std::future::Future;
use std::io::ErrorKind;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir, TempPath};
use tracing::{debug, warn};

/// Prefix of every scratch file and directory name.
pub const SCRATCH_PREFIX: &str = "pdf-engine-";

/// What kind of scratch resource to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchKind {
    /// An empty regular file.
    File,
    /// An empty directory; removed recursively on release.
    Directory,
}

/// Creates scratch resources under a root directory.
#[derive(Debug, Clone, Default)]
pub struct ScratchManager {
    root: Option<PathBuf>,
}

impl ScratchManager {
    /// `root = None` uses the system temp dir.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// The directory new resources are created in.
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Create a scratch resource. The caller owns it until [`ScratchResource::release`].
    pub fn acquire(
        &self,
        kind: ScratchKind,
        suffix: Option<&str>,
    ) -> Result<ScratchResource, ConversionError> {
        let root = self.root();
        let mut builder = Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        if let Some(suffix) = suffix {
            builder.suffix(suffix);
        }

        let inner = match kind {
            ScratchKind::File => builder
                .tempfile_in(&root)
                .map(|f| Inner::File(f.into_temp_path())),
            ScratchKind::Directory => builder.tempdir_in(&root).map(Inner::Directory),
        }
        .map_err(|source| ConversionError::Scratch { source })?;

        let resource = ScratchResource { inner };
        debug!("Acquired scratch {:?} at {}", kind, resource.path().display());
        Ok(resource)
    }

    /// Run `body` with a fresh scratch resource and release it afterwards.
    ///
    /// The resource is gone by the time this returns, whether `body`
    /// succeeded, failed, or panicked. A panic is re-raised after cleanup.
    pub async fn scoped<T, F, Fut>(
        &self,
        kind: ScratchKind,
        suffix: Option<&str>,
        body: F,
    ) -> Result<T, ConversionError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T, ConversionError>>,
    {
        let resource = self.acquire(kind, suffix)?;
        let outcome = AssertUnwindSafe(body(resource.path().to_path_buf()))
            .catch_unwind()
            .await;
        resource.release();

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// An exclusively owned scratch file or directory.
///
/// Dropping it without [`release`](Self::release) still removes it, which
/// covers unwinding; `release` additionally reports failures to the log.
#[derive(Debug)]
pub struct ScratchResource {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    File(TempPath),
    Directory(TempDir),
}

impl ScratchResource {
    pub fn path(&self) -> &Path {
        match &self.inner {
            Inner::File(p) => p,
            Inner::Directory(d) => d.path(),
        }
    }

    pub fn kind(&self) -> ScratchKind {
        match self.inner {
            Inner::File(_) => ScratchKind::File,
            Inner::Directory(_) => ScratchKind::Directory,
        }
    }

    /// Delete the resource. Never fails; problems are logged.
    pub fn release(self) {
        let path = self.path().to_path_buf();
        let result = match self.inner {
            Inner::File(p) => p.close(),
            Inner::Directory(d) => d.close(),
        };
        match result {
            Ok(()) => debug!("Released scratch {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Scratch {} was already gone", path.display())
            }
            Err(e) => warn!("Failed to remove scratch {}: {}", path.display(), e),
        }
    }
}
