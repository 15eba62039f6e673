//! Read-only public asset store.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Why a request path did not map to a servable file.
#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    NotFound,
    Forbidden,
    BadPath,
}

/// File lookup by request path under a single root directory.
///
/// # Implementations
///
/// - [`DirAssetStore`] - filesystem directory (the `public/` folder)
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Maps a request path to a regular file inside the store.
    ///
    /// Directories, missing files and anything escaping the root are
    /// reported as errors; the caller passes those requests on.
    async fn locate(&self, request_path: &str) -> Result<PathBuf, ResolveError>;
}

/// Asset store backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetStore for DirAssetStore {
    async fn locate(&self, request_path: &str) -> Result<PathBuf, ResolveError> {
        let relative = relative_asset_path(request_path)?;

        let base = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|_| ResolveError::NotFound)?;

        let target = tokio::fs::canonicalize(base.join(&relative))
            .await
            .map_err(|_| ResolveError::NotFound)?;

        // Symlinks may still point outside the root.
        if !target.starts_with(&base) {
            return Err(ResolveError::Forbidden);
        }

        let meta = tokio::fs::metadata(&target)
            .await
            .map_err(|_| ResolveError::NotFound)?;
        if !meta.is_file() {
            return Err(ResolveError::NotFound);
        }

        Ok(target)
    }
}

/// Percent-decodes a request path once and validates its components.
fn relative_asset_path(request_path: &str) -> Result<PathBuf, ResolveError> {
    if !request_path.starts_with('/') {
        return Err(ResolveError::BadPath);
    }

    let decoded = percent_encoding::percent_decode_str(request_path)
        .decode_utf8()
        .map_err(|_| ResolveError::BadPath)?;

    if decoded.contains('\0') {
        return Err(ResolveError::BadPath);
    }

    let decoded = decoded.trim_start_matches('/');
    if decoded.is_empty() {
        return Err(ResolveError::NotFound);
    }

    let relative = PathBuf::from(decoded);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            // ParentDir, RootDir, Prefix (Windows)
            _ => return Err(ResolveError::Forbidden),
        }
    }

    Ok(relative)
}
