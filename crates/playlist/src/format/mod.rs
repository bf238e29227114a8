//! Playlist files that behave like directories during a scan.
//!
//! Both formats boil down to an ordered list of [`Reference`]s: a location
//! (absolute URI, absolute path or a path relative to the playlist) plus
//! whatever labels the file carried.

mod ayl;
mod xspf;

use crate::error::Result;
use std::time::Duration;

/// One entry of a playlist file, not yet resolved against anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reference {
    pub location: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub duration: Option<Duration>,
}

impl Reference {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum PlaylistFormat {
    #[display("xspf")]
    Xspf,
    #[display("ayl")]
    Ayl,
}

impl PlaylistFormat {
    /// Recognise a playlist by its file name suffix.
    ///
    /// ```
    /// use trove_playlist::PlaylistFormat;
    ///
    /// assert_eq!(PlaylistFormat::from_name("Best Of.XSPF"), Some(PlaylistFormat::Xspf));
    /// assert_eq!(PlaylistFormat::from_name("tunes.ayl"), Some(PlaylistFormat::Ayl));
    /// assert_eq!(PlaylistFormat::from_name("song.pt3"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "xspf" => Some(Self::Xspf),
            "ayl" => Some(Self::Ayl),
            _ => None,
        }
    }

    /// Parse the whole file into references, in file order.
    pub fn parse(&self, content: &[u8]) -> Result<Vec<Reference>> {
        match self {
            Self::Xspf => xspf::parse(content),
            Self::Ayl => ayl::parse(content),
        }
    }
}
