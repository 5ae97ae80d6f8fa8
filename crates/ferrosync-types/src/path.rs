//! Path guarding for remote operations
//!
//! Every remote path is normalized here before it reaches a remote primitive.
//! Normalization converts backslashes to forward slashes, collapses repeated
//! separators and `.` segments, and rejects any `..` segment outright. No
//! attempt is made to resolve `..` lexically: a path that contains one is
//! refused.

use crate::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

const PARENT_SEGMENT: &str = "..";

/// Normalize a remote path, rejecting parent traversal.
///
/// Absolute paths keep their leading slash. A path made only of separators
/// normalizes to `/`, a relative path made only of `.` segments to `.`.
pub fn normalize_remote_path(path: &str) -> Result<String> {
    if path.is_empty() {
        return Err(Error::other("remote path is empty"));
    }

    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut segments = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            PARENT_SEGMENT => return Err(Error::path_security(path)),
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    Ok(match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    })
}

/// Join a normalized remote base directory and a relative path
pub fn join_remote(base: &str, relative: &RelativePath) -> String {
    match base {
        "." => relative.as_str().to_string(),
        _ if base.ends_with('/') => format!("{}{}", base, relative),
        _ => format!("{}/{}", base, relative),
    }
}

/// Parent directory of a normalized remote path, if it has one
pub fn remote_parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(index) => Some(&trimmed[..index]),
    }
}

/// Quote a path for a POSIX shell, as single-quoted text
pub fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}

/// A path relative to a sync root
///
/// Always forward-slash separated, never empty, never absolute and never
/// containing a `..` segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct RelativePath(String);

impl RelativePath {
    /// Validate and normalize a relative path
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let unified = raw.replace('\\', "/");
        let mut segments = Vec::new();

        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                PARENT_SEGMENT => return Err(Error::path_security(raw)),
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(Error::other(format!("relative path '{}' is empty", raw)));
        }

        Ok(Self(segments.join("/")))
    }

    /// Build a relative path from a local path below `root`
    pub fn from_local(root: &Path, path: &Path) -> Result<Self> {
        let relative = path.strip_prefix(root).map_err(|_| {
            Error::other(format!(
                "'{}' is not below '{}'",
                path.display(),
                root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            let segment = component.as_os_str().to_str().ok_or_else(|| {
                Error::other(format!("'{}' is not valid UTF-8", path.display()))
            })?;
            segments.push(segment);
        }

        Self::new(segments.join("/"))
    }

    /// The normalized text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments of the path
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Resolve against a local root using the host's separator
    pub fn to_local_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RelativePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RelativePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}
