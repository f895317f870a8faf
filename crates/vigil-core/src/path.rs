#![forbid(unsafe_code)]

//! Property-access paths.
//!
//! A [`Path`] is the ordered list of steps from a store root to a value. Each
//! step is a string: either a literal property name or a key token issued by
//! the [`KeyRegistry`](crate::registry::KeyRegistry). Paths compare
//! structurally; their joined form (`a.b.c`) is what effect records and read
//! sets store.

use std::fmt;

/// Separator used by [`Path::joined`].
pub const PATH_SEPARATOR: char = '.';

/// Reserved segment for Map/Set size reads and size-change notifications.
pub const SIZE_SEGMENT: &str = "size";

/// Segment under which array length is read and written.
pub const LENGTH_SEGMENT: &str = "length";

/// An ordered sequence of access steps from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The empty path (the root itself).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// A new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment.into());
        Self { segments }
    }

    /// The path without its last segment (`None` for the root).
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Segments joined with [`PATH_SEPARATOR`].
    #[must_use]
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push(PATH_SEPARATOR);
            }
            out.push_str(segment);
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}
