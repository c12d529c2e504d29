//! Filesystem-backed collection, media access and write-back.

use super::{
    AssetDescriptor, CollectionEnumerator, DeletionConfirmation, ImageFilter, MediaAccess,
    RestoreTarget,
};
use crate::core::fingerprint::{pack_rgb, PixelBuffer};
use crate::error::MediaError;
use console::Term;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// A directory tree of images.
///
/// Identifiers are path strings, so the same value works for both
/// enumeration and media access.
#[derive(Debug, Clone)]
pub struct FsCollection {
    root: PathBuf,
    filter: ImageFilter,
    follow_symlinks: bool,
}

impl FsCollection {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: ImageFilter::new(),
            follow_symlinks: false,
        }
    }

    pub fn with_filter(mut self, filter: ImageFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn describe(identifier: &str, path: &Path, metadata: &fs::Metadata) -> AssetDescriptor {
        let mut descriptor = AssetDescriptor::new(identifier).with_size(metadata.len());

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            descriptor = descriptor.with_display_name(name);
        }
        if let Some(seconds) = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        {
            descriptor = descriptor.with_modified_at(seconds.as_secs() as i64);
        }
        // Header-only read; formats `image` cannot parse just lack dimensions
        if let Ok((width, height)) = image::image_dimensions(path) {
            descriptor = descriptor.with_dimensions(width, height);
        }

        descriptor
    }
}

impl CollectionEnumerator for FsCollection {
    /// Most recently modified first, ties broken by identifier
    fn enumerate(&self) -> Result<Vec<AssetDescriptor>, MediaError> {
        if !self.root.is_dir() {
            return Err(MediaError::Enumerate {
                path: self.root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        // One spelling per file, whatever path the caller typed
        let root = fs::canonicalize(&self.root).map_err(|e| MediaError::Enumerate {
            path: self.root.clone(),
            reason: e.to_string(),
        })?;
        let root = root.as_path();
        let include_hidden = self.filter.includes_hidden();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .into_iter()
            .filter_entry(|entry| {
                include_hidden || entry.path() == root || !ImageFilter::is_hidden(entry.path())
            });

        let mut assets = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.filter.should_include(entry.path()) {
                continue;
            }

            let Some(identifier) = entry.path().to_str() else {
                tracing::warn!("Skipping non-UTF-8 path {}", entry.path().display());
                continue;
            };

            match entry.metadata() {
                Ok(metadata) => assets.push(Self::describe(identifier, entry.path(), &metadata)),
                Err(e) => tracing::warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        assets.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        tracing::debug!("Enumerated {} assets under {}", assets.len(), root.display());
        Ok(assets)
    }
}

impl MediaAccess for FsCollection {
    fn decode_pixels(
        &self,
        identifier: &str,
        max_dimension: u32,
    ) -> Result<PixelBuffer, MediaError> {
        let path = Path::new(identifier);
        if !path.exists() {
            return Err(MediaError::NotFound {
                identifier: identifier.to_string(),
            });
        }

        let image = image::open(path).map_err(|e| MediaError::Decode {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })?;

        let image = if image.width() > max_dimension || image.height() > max_dimension {
            image.thumbnail(max_dimension, max_dimension)
        } else {
            image
        };

        let rgb = image.to_rgb8();
        let pixels = rgb.pixels().map(|p| pack_rgb(p[0], p[1], p[2])).collect();
        Ok(PixelBuffer::new(rgb.width(), rgb.height(), pixels))
    }

    fn open_stream(&self, identifier: &str) -> Result<Box<dyn Read + Send>, MediaError> {
        let file = File::open(identifier).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                MediaError::NotFound {
                    identifier: identifier.to_string(),
                }
            } else {
                MediaError::Open {
                    identifier: identifier.to_string(),
                    source,
                }
            }
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// The identifier for `path`: absolute, with symlinks and `.`/`..` resolved.
///
/// A file that no longer exists resolves through its parent directory, so a
/// quarantined asset can still be named for restore.
pub fn identifier_for(path: &Path) -> Result<String, MediaError> {
    let resolved = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let not_found = || MediaError::NotFound {
                identifier: path.display().to_string(),
            };
            let name = path.file_name().ok_or_else(not_found)?;
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::canonicalize(parent).map_err(|_| not_found())?.join(name)
        }
        Err(source) => {
            return Err(MediaError::Open {
                identifier: path.display().to_string(),
                source,
            })
        }
    };

    resolved
        .into_os_string()
        .into_string()
        .map_err(|raw| MediaError::NonUtf8Path { path: raw.into() })
}

/// Writes restored files into a directory without overwriting anything
#[derive(Debug, Clone)]
pub struct FsRestoreTarget {
    directory: PathBuf,
}

impl FsRestoreTarget {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `name`, then `stem (1).ext`, `stem (2).ext`, ...
    fn candidate(name: &str, attempt: u32) -> String {
        if attempt == 0 {
            return name.to_string();
        }
        let path = Path::new(name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem} ({attempt}).{ext}"),
            None => format!("{stem} ({attempt})"),
        }
    }

    fn create_unique(directory: &Path, name: &str) -> Result<(PathBuf, File), MediaError> {
        let mut attempt = 0;
        loop {
            let path = directory.join(Self::candidate(name, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => {
                    return Err(MediaError::Write {
                        target: path.display().to_string(),
                        source,
                    })
                }
            }
        }
    }
}

impl RestoreTarget for FsRestoreTarget {
    fn write_back(
        &self,
        reader: &mut dyn Read,
        display_name: &str,
        mime_type: &str,
    ) -> Result<String, MediaError> {
        let dir_failed = |source| MediaError::Write {
            target: self.directory.display().to_string(),
            source,
        };
        fs::create_dir_all(&self.directory).map_err(dir_failed)?;
        // Restored identifiers must match what a later scan produces
        let directory = fs::canonicalize(&self.directory).map_err(dir_failed)?;
        if directory.to_str().is_none() {
            return Err(MediaError::NonUtf8Path { path: directory });
        }

        // Never let a stored name escape the restore directory
        let name = Path::new(display_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("restored");

        let (path, mut file) = Self::create_unique(&directory, name)?;
        if let Err(source) = io::copy(reader, &mut file) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(MediaError::Write {
                target: path.display().to_string(),
                source,
            });
        }

        tracing::debug!("Restored {} ({})", path.display(), mime_type);
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Deletes original files
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDeletion;

impl FsDeletion {
    /// Remove the file. An already missing file counts as removed.
    pub fn remove(&self, identifier: &str) -> Result<(), MediaError> {
        match fs::remove_file(identifier) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MediaError::Write {
                target: identifier.to_string(),
                source,
            }),
        }
    }
}

/// Deletes without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl DeletionConfirmation for AutoConfirm {
    fn confirm_deletion(&self, identifier: &str) -> Result<bool, MediaError> {
        FsDeletion.remove(identifier)?;
        Ok(true)
    }
}

/// Asks on the terminal before deleting
pub struct PromptConfirm {
    term: Term,
}

impl PromptConfirm {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for PromptConfirm {
    fn default() -> Self {
        Self::new()
    }
}

impl DeletionConfirmation for PromptConfirm {
    fn confirm_deletion(&self, identifier: &str) -> Result<bool, MediaError> {
        let prompt_failed = |source: io::Error| MediaError::Read {
            identifier: identifier.to_string(),
            source,
        };

        self.term
            .write_str(&format!(
                "Delete {} (a backup is kept)? [y/N] ",
                console::style(identifier).bold()
            ))
            .map_err(prompt_failed)?;
        let answer = self.term.read_line().map_err(prompt_failed)?;

        if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            FsDeletion.remove(identifier)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
