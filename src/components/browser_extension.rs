//! Browser extension: pointer file, zip download, copy into place.
//!
//! The pointer file holds the current package URL. The package is a zip
//! whose `extension/` directory (at any depth) is the unpacked extension;
//! its contents are copied over the install directory. An archive without
//! that directory fails the attempt and leaves the install directory as it
//! was.

use super::{ComponentError, ComponentInstaller, ComponentKind};
use crate::Transport;
use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Directory inside the package holding the extension.
pub const EXTENSION_SUBDIR: &str = "extension";

/// File whose presence marks the extension as installed.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Installs the browser extension from its published package.
pub struct BrowserExtensionInstaller {
    transport: Arc<dyn Transport>,
    pointer_url: String,
    install_dir: PathBuf,
    staging_root: PathBuf,
}

impl std::fmt::Debug for BrowserExtensionInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserExtensionInstaller")
            .field("pointer_url", &self.pointer_url)
            .field("install_dir", &self.install_dir)
            .finish_non_exhaustive()
    }
}

impl BrowserExtensionInstaller {
    /// Installer reading the package URL from `pointer_url` and installing
    /// into `install_dir`. Downloads are staged under `staging_root`.
    pub fn new(
        transport: Arc<dyn Transport>,
        pointer_url: impl Into<String>,
        install_dir: impl Into<PathBuf>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            pointer_url: pointer_url.into(),
            install_dir: install_dir.into(),
            staging_root: staging_root.into(),
        }
    }

    async fn package_url(&self) -> Result<String, ComponentError> {
        let body = self.transport.get_text(&self.pointer_url).await?;
        body.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ComponentError::Unavailable(format!(
                    "pointer file {} does not name a package",
                    self.pointer_url
                ))
            })
    }
}

#[async_trait]
impl ComponentInstaller for BrowserExtensionInstaller {
    fn kind(&self) -> ComponentKind {
        ComponentKind::BrowserExtension
    }

    async fn is_installed(&self) -> bool {
        self.install_dir.join(MANIFEST_FILE).is_file()
    }

    async fn install(&self) -> Result<(), ComponentError> {
        let url = self.package_url().await?;
        tracing::info!(%url, "downloading browser extension");

        std::fs::create_dir_all(&self.staging_root)?;
        let staging = tempfile::Builder::new()
            .prefix("browser-extension-")
            .tempdir_in(&self.staging_root)?;
        let archive = staging.path().join("extension.zip");
        self.transport.download(&url, &archive).await?;

        let unpacked = staging.path().join("unpacked");
        let entries = extract_archive(&archive, &unpacked)?;
        tracing::debug!(entries, "extracted extension package");

        let source = find_extension_dir(&unpacked)?;
        let copied = copy_tree(&source, &self.install_dir)?;
        tracing::info!(
            files = copied,
            dir = %self.install_dir.display(),
            "browser extension installed"
        );
        Ok(())
    }
}

fn malformed(err: zip::result::ZipError) -> ComponentError {
    ComponentError::MalformedArchive(err.to_string())
}

/// Unpack `archive` into `dest`, skipping entries that escape it.
fn extract_archive(archive: &Path, dest: &Path) -> Result<usize, ComponentError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(malformed)?;
    std::fs::create_dir_all(dest)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(malformed)?;
        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                tracing::warn!(name = entry.name(), "skipping archive entry outside the root");
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|e| ComponentError::MalformedArchive(format!("{}: {e}", entry.name())))?;
    }
    Ok(zip.len())
}

fn walk_error(err: walkdir::Error) -> ComponentError {
    ComponentError::Io(err.into())
}

/// The shallowest `extension` directory under `root`, which must not be empty.
fn find_extension_dir(root: &Path) -> Result<PathBuf, ComponentError> {
    let mut found: Option<walkdir::DirEntry> = None;
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if !(entry.file_type().is_dir() && entry.file_name() == EXTENSION_SUBDIR) {
            continue;
        }
        if found.as_ref().map_or(true, |f| entry.depth() < f.depth()) {
            found = Some(entry);
        }
    }

    let dir = found.map(|e| e.into_path()).ok_or_else(|| {
        ComponentError::MalformedArchive(format!(
            "package has no `{EXTENSION_SUBDIR}` directory"
        ))
    })?;

    if std::fs::read_dir(&dir)?.next().is_none() {
        return Err(ComponentError::MalformedArchive(format!(
            "`{EXTENSION_SUBDIR}` directory in package is empty"
        )));
    }
    Ok(dir)
}

/// Copy every file under `source` into `dest`, overwriting existing files.
///
/// Any unreadable entry aborts the copy.
fn copy_tree(source: &Path, dest: &Path) -> Result<usize, ComponentError> {
    std::fs::create_dir_all(dest)?;
    let mut copied = 0;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(walk_error)?;
        let path = entry.path();
        let relative = path.strip_prefix(source).unwrap_or(path);
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(path, &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
