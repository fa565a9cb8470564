//! Photo attachment resolver contract.
//!
//! The camera and gallery pickers live in the UI shell; core only sees
//! their outcome: a resolved URI, a cancellation, or a failure.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static PHOTO_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:.*\S.*$").expect("valid photo uri regex")
});

/// User-facing options offered when adding a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    Capture,
    PickFromLibrary,
    Cancel,
}

impl PhotoSource {
    /// Options in the order they are presented.
    pub const OPTIONS: [PhotoSource; 3] = [Self::Capture, Self::PickFromLibrary, Self::Cancel];

    pub fn label(self) -> &'static str {
        match self {
            Self::Capture => "Take photo",
            Self::PickFromLibrary => "Choose from library",
            Self::Cancel => "Cancel",
        }
    }

    /// Maps an option-sheet index back to a source.
    ///
    /// Unknown indexes (sheet dismissed, stale index) read as `Cancel`.
    pub fn from_option_index(index: usize) -> Self {
        Self::OPTIONS.get(index).copied().unwrap_or(Self::Cancel)
    }
}

/// Outcome of one resolver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPhoto {
    Uri(String),
    Cancelled,
}

/// Resolver failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Camera permission was refused; the user may retry later.
    PermissionDenied,
    /// Picker failed for any other reason.
    Failed(String),
}

impl Display for ResolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "camera permission denied"),
            Self::Failed(message) => write!(f, "photo picker failed: {message}"),
        }
    }
}

impl Error for ResolverError {}

/// Camera/gallery capability supplied by the UI shell.
pub trait AttachmentResolver {
    /// Captures a new photo, checking camera permission first.
    fn capture(&mut self) -> Result<ResolvedPhoto, ResolverError>;
    /// Lets the user pick an existing photo.
    fn pick_from_library(&mut self) -> Result<ResolvedPhoto, ResolverError>;
}

/// Runs the resolver matching `source`. `Cancel` never reaches the resolver.
pub fn resolve<R>(resolver: &mut R, source: PhotoSource) -> Result<ResolvedPhoto, ResolverError>
where
    R: AttachmentResolver + ?Sized,
{
    match source {
        PhotoSource::Capture => resolver.capture(),
        PhotoSource::PickFromLibrary => resolver.pick_from_library(),
        PhotoSource::Cancel => Ok(ResolvedPhoto::Cancelled),
    }
}

/// Returns whether `value` has the `scheme:rest` shape pickers return
/// (`file:///...`, `content://...`, `ph://...`).
///
/// `rest` may contain spaces but must not be blank or span lines.
pub fn is_photo_uri(value: &str) -> bool {
    PHOTO_URI_RE.is_match(value)
}
