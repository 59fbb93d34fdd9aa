//! Filename derivation, sanitization, and destination path resolution.
//!
//! The destination path is never stored: [`Destination::resolve`] recomputes
//! it from the configured directory, base name and detected extension every
//! time it is needed, so probing, polling and transferring always agree on
//! the same file.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use super::constants::{MAX_FILENAME_LEN, TRUNCATION_RESERVE};
use super::error::DownloadError;

/// Base name used when the URL has no usable final path segment.
const FALLBACK_BASE_NAME: &str = "download";

/// Character substitution table to apply when sanitizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeStyle {
    /// Newline, slash, pipe, colon and apostrophe substitutions.
    Posix,
    /// [`Posix`](Self::Posix) plus `" ? * \ < >` replaced with spaces.
    Windows,
}

impl SanitizeStyle {
    /// The style matching the filesystem conventions of the build target.
    #[must_use]
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// Where a download lands on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Target directory; `None` means the current working directory.
    pub directory: Option<PathBuf>,
    /// File name without the detected extension.
    pub base_name: String,
    /// Append `.` + detected extension to `base_name`.
    pub rename: bool,
    /// Replace characters the host filesystem rejects and cap the length.
    pub sanitize: bool,
}

impl Destination {
    /// Resolves the destination path for the given extension.
    ///
    /// # Errors
    ///
    /// See [`resolve_path`].
    pub fn resolve(&self, extension: &str) -> Result<PathBuf, DownloadError> {
        resolve_path(
            &self.base_name,
            extension,
            self.directory.as_deref(),
            self.sanitize,
            self.rename,
        )
    }
}

/// Computes the local file path for a download.
///
/// The composed name is `base_name` when `rename` is false, otherwise
/// `base_name.extension`. With `sanitize` set the composed name goes through
/// [`sanitize_filename`].
///
/// # Errors
///
/// - [`DownloadError::MissingDirectory`] if `directory` is given but does not
///   exist (it is never created).
/// - [`DownloadError::InvalidConfig`] if the composed name is empty or a
///   relative path component such as `..`.
pub fn resolve_path(
    base_name: &str,
    extension: &str,
    directory: Option<&Path>,
    sanitize: bool,
    rename: bool,
) -> Result<PathBuf, DownloadError> {
    let directory = directory.filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = directory
        && !dir.is_dir()
    {
        return Err(DownloadError::missing_directory(dir));
    }

    let composed = if rename && !extension.is_empty() {
        format!("{base_name}.{extension}")
    } else {
        base_name.to_string()
    };
    let file_name = if sanitize {
        sanitize_filename(&composed)
    } else {
        composed
    };

    if file_name.trim().is_empty() || file_name == "." || file_name == ".." {
        return Err(DownloadError::invalid_config(format!(
            "'{file_name}' is not a usable file name"
        )));
    }

    let path = match directory {
        Some(dir) => dir.join(&file_name),
        None => PathBuf::from(&file_name),
    };
    debug!(path = %path.display(), "resolved destination path");
    Ok(path)
}

/// Sanitizes a file name for the host filesystem and caps its length.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    sanitize_filename_with(name, SanitizeStyle::host())
}

/// Sanitizes a file name with an explicit substitution table.
#[must_use]
pub fn sanitize_filename_with(name: &str, style: SanitizeStyle) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\n' | '/' => out.push(' '),
            '|' => out.push('-'),
            ':' => {
                // ": " collapses to a single full-width colon
                if chars.peek() == Some(&' ') {
                    chars.next();
                }
                out.push('\u{FF1A}');
            }
            '\'' => out.push('\u{2019}'),
            '"' | '?' | '*' | '\\' | '<' | '>' if style == SanitizeStyle::Windows => {
                out.push(' ');
            }
            c => out.push(c),
        }
    }
    limit_length(&out, MAX_FILENAME_LEN)
}

/// Truncates `s` to fit within `max_len` characters.
///
/// Overlong strings are cut to `max_len - 3` characters so a caller can
/// append a three-character marker without exceeding the cap; nothing is
/// appended here.
#[must_use]
pub fn limit_length(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    s.chars()
        .take(max_len.saturating_sub(TRUNCATION_RESERVE))
        .collect()
}

/// Splits the final URL path segment into base name and extension.
///
/// The segment is percent-decoded; the extension is the text after the last
/// `.`. A segment without a usable name yields `"download"`.
#[must_use]
pub fn name_and_extension_from_url(url: &Url) -> (String, Option<String>) {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty())
        .map(|last| {
            urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned())
        });

    let Some(segment) = segment else {
        return (FALLBACK_BASE_NAME.to_string(), None);
    };

    match segment.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < segment.len() => (
            segment[..dot].to_string(),
            Some(segment[dot + 1..].to_string()),
        ),
        _ => (segment, None),
    }
}

/// Extracts the subtype of a `Content-Type` value as a file extension.
///
/// `"video/mp4; codecs=avc1"` yields `"mp4"`. Values without a subtype yield
/// `None`.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    let (_, subtype) = mime.split_once('/')?;
    let subtype = subtype.trim();
    (!subtype.is_empty()).then(|| subtype.to_ascii_lowercase())
}
