//! Composite addresses for objects that may live inside archives.
//!
//! An [`Identifier`] is an outer location (any absolute URL a backend root can
//! resolve) plus an optional subpath into the archive found at that location.
//! The subpath is carried in the URL fragment, one percent-encoded component
//! per `/`-separated segment:
//!
//! ```text
//! file:///music/pack.zip#demos/song%231.ay
//! \____________________/ \_______________/
//!        location             subpath = ["demos", "song#1.ay"]
//! ```
//!
//! Because every component is encoded on its own, a component may contain a
//! literal `/` (it is written as `%2F`) without changing the shape of the
//! subpath.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Characters escaped inside a single subpath component.
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Characters escaped inside a path segment of a relative playlist reference.
/// Same as [`COMPONENT`] minus `%` (references are already URI-ish text).
const REFERENCE_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Address of a VFS object: an outer location plus an optional archive subpath.
///
/// Equality and ordering are structural: first the location, then the subpath
/// compared component by component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    location: Url,
    subpath: Vec<String>,
}

impl Identifier {
    /// Build an identifier from a location and subpath components.
    ///
    /// Any fragment already present on `location` is discarded. Empty
    /// components are rejected since they cannot survive a round-trip.
    pub fn new<S: Into<String>>(mut location: Url, subpath: impl IntoIterator<Item = S>) -> Result<Self> {
        let subpath: Vec<String> = subpath.into_iter().map(Into::into).collect();
        if subpath.iter().any(String::is_empty) {
            exn::bail!(ErrorKind::InvalidIdentifier(format!(
                "empty subpath component in {location} {subpath:?}"
            )));
        }
        location.set_fragment(None);
        Ok(Self { location, subpath })
    }

    /// Identifier for a plain backend object (no archive subpath).
    pub fn for_location(mut location: Url) -> Self {
        location.set_fragment(None);
        Self {
            location,
            subpath: Vec::new(),
        }
    }

    /// Identifier for an object inside the archive at `location`, taking the
    /// subpath as the `/`-separated form a codec reports.
    pub fn for_file_in_archive(location: Url, subpath: &str) -> Result<Self> {
        Self::new(location, subpath.split('/').filter(|c| !c.is_empty()))
    }

    /// Identifier for a local filesystem path. The path must be absolute.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let location = Url::from_file_path(path)
            .ok()
            .ok_or_raise(|| ErrorKind::InvalidIdentifier(path.display().to_string()))?;
        Ok(Self::for_location(location))
    }

    /// Parse the text form produced by [`Display`].
    ///
    /// Empty subpath components (`#a//b`, a trailing `#`) are dropped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut location = Url::parse(text).or_raise(|| ErrorKind::InvalidIdentifier(text.to_string()))?;
        let subpath = match location.fragment() {
            Some(fragment) => fragment
                .split('/')
                .filter(|component| !component.is_empty())
                .map(|component| decode_component(component, text))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        location.set_fragment(None);
        Ok(Self { location, subpath })
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn subpath(&self) -> &[String] {
        &self.subpath
    }

    /// `true` when the identifier addresses something nested in an archive.
    pub fn is_archived(&self) -> bool {
        !self.subpath.is_empty()
    }

    /// The identifier of the outer archive file itself.
    pub fn archive_location(&self) -> Identifier {
        Self::for_location(self.location.clone())
    }

    /// The URI an object at this identifier reports: the location with the
    /// encoded subpath as its fragment.
    pub fn to_uri(&self) -> Url {
        let mut uri = self.location.clone();
        if self.is_archived() {
            uri.set_fragment(Some(&self.encoded_subpath()));
        }
        uri
    }

    fn encoded_subpath(&self) -> String {
        self.subpath
            .iter()
            .map(|component| utf8_percent_encode(component, COMPONENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Subpath joined with `/`, the form codecs expect. Empty for plain objects.
    pub fn subpath_string(&self) -> String {
        self.subpath.join("/")
    }

    /// Append one subpath component.
    pub fn with_component(&self, component: impl Into<String>) -> Result<Self> {
        let mut subpath = self.subpath.clone();
        subpath.push(component.into());
        Self::new(self.location.clone(), subpath)
    }

    /// The enclosing in-archive directory, or `None` at the archive root.
    pub fn parent_in_archive(&self) -> Option<Self> {
        let (_, parent) = self.subpath.split_last()?;
        Some(Self {
            location: self.location.clone(),
            subpath: parent.to_vec(),
        })
    }

    /// Human-readable last element: the last subpath component, or the last
    /// (decoded) path segment of the location.
    pub fn display_name(&self) -> String {
        if let Some(last) = self.subpath.last() {
            return last.clone();
        }
        self.location
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
            .or_else(|| self.location.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Resolve a playlist entry against the identifier of the playlist file.
    ///
    /// - absolute URIs (`http://...`, `joshw:/...`) are taken as they are,
    ///   including any subpath fragment,
    /// - POSIX absolute paths become `file:` locations,
    /// - anything else is relative to the directory containing `self`; inside
    ///   an archive that is the enclosing in-archive directory.
    ///
    /// Windows absolute paths are not supported; check with
    /// [`is_windows_absolute`] first.
    pub fn resolve_reference(&self, reference: &str) -> Result<Identifier> {
        let reference = reference.trim();
        if reference.is_empty() || is_windows_absolute(reference) {
            exn::bail!(ErrorKind::InvalidIdentifier(reference.to_string()));
        }
        if has_scheme(reference) {
            return Self::parse(reference);
        }
        let normalized = reference.replace('\\', "/");
        if normalized.starts_with('/') {
            return Self::from_path(&normalized);
        }
        if self.is_archived() {
            let mut components: Vec<String> = self.subpath[..self.subpath.len() - 1].to_vec();
            for segment in normalized.split('/') {
                match segment {
                    "" | "." => {},
                    ".." => {
                        components
                            .pop()
                            .ok_or_raise(|| ErrorKind::InvalidIdentifier(reference.to_string()))?;
                    },
                    other => components.push(other.to_string()),
                }
            }
            return Self::new(self.location.clone(), components);
        }
        let encoded = normalized
            .split('/')
            .map(|segment| utf8_percent_encode(segment, REFERENCE_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        let location = self
            .location
            .join(&encoded)
            .or_raise(|| ErrorKind::InvalidIdentifier(reference.to_string()))?;
        Ok(Self::for_location(location))
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.location.as_str())?;
        if self.is_archived() {
            write!(f, "#{}", self.encoded_subpath())?;
        }
        Ok(())
    }
}

impl FromStr for Identifier {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Url> for Identifier {
    fn from(location: Url) -> Self {
        Self::for_location(location)
    }
}

/// `C:\foo`, `C:/foo` or `\\server\share`.
pub fn is_windows_absolute(reference: &str) -> bool {
    let bytes = reference.as_bytes();
    let drive = bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/');
    drive || reference.starts_with("\\\\")
}

/// Scheme detection that refuses single-letter "schemes" (Windows drives).
fn has_scheme(reference: &str) -> bool {
    match reference.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        },
        None => false,
    }
}

fn decode_component(component: &str, text: &str) -> Result<String> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .or_raise(|| ErrorKind::InvalidIdentifier(text.to_string()))
}
