//! XML Shareable Playlist Format.
//!
//! Only `<trackList><track>` entries are read; anything at playlist level
//! (the playlist's own `<title>`, extensions, ...) is ignored.

use super::Reference;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Field {
    Location,
    Title,
    Creator,
    Duration,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"location" => Some(Self::Location),
            b"title" => Some(Self::Title),
            b"creator" => Some(Self::Creator),
            b"duration" => Some(Self::Duration),
            _ => None,
        }
    }

    fn apply(self, reference: &mut Reference, text: &str) {
        let append = |slot: &mut Option<String>| slot.get_or_insert_with(String::new).push_str(text);
        match self {
            Self::Location => reference.location.push_str(text),
            Self::Title => append(&mut reference.title),
            Self::Creator => append(&mut reference.author),
            // Malformed durations are dropped, the entry itself is still fine.
            Self::Duration => reference.duration = text.trim().parse().ok().map(Duration::from_millis),
        }
    }
}

pub(super) fn parse(content: &[u8]) -> Result<Vec<Reference>> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut references = Vec::new();
    let mut track: Option<Reference> = None;
    let mut field: Option<Field> = None;
    loop {
        match reader.read_event_into(&mut buf).or_raise(|| ErrorKind::Malformed("xspf"))? {
            Event::Start(tag) => match tag.local_name().as_ref() {
                b"track" => track = Some(Reference::default()),
                other => field = Field::from_tag(other),
            },
            Event::Text(text) => {
                if let (Some(reference), Some(field)) = (track.as_mut(), field) {
                    let text = text.unescape().or_raise(|| ErrorKind::Malformed("xspf"))?;
                    field.apply(reference, &text);
                }
            },
            Event::CData(data) => {
                if let (Some(reference), Some(field)) = (track.as_mut(), field) {
                    field.apply(reference, &String::from_utf8_lossy(&data));
                }
            },
            Event::End(tag) => {
                field = None;
                if tag.local_name().as_ref() == b"track"
                    && let Some(mut reference) = track.take()
                {
                    reference.location = reference.location.trim().to_string();
                    if !reference.location.is_empty() {
                        references.push(reference);
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }
    Ok(references)
}
