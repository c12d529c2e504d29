//! Which files count as images.

use std::collections::HashSet;
use std::path::Path;

/// Filters files by extension and visibility
#[derive(Debug, Clone)]
pub struct ImageFilter {
    extensions: HashSet<String>,
    include_hidden: bool,
}

impl ImageFilter {
    /// Common photo formats. HEIC/HEIF are listed so they are enumerated;
    /// decoding them needs a host-side `MediaAccess`.
    pub fn new() -> Self {
        Self {
            extensions: [
                "jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff", "heic", "heif",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            include_hidden: false,
        }
    }

    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Replace the accepted extensions (case-insensitive)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn includes_hidden(&self) -> bool {
        self.include_hidden
    }

    pub fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
    }

    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && Self::is_hidden(path) {
            return false;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}
