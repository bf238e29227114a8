//! AY emulator playlists (`.ayl`).
//!
//! ```text
//! ZX Spectrum Sound Chip Emulator Play List File v1.
//! C:\Music\Tunes\intro.pt3          <- absolute Windows path, skipped later
//! tunes\song.stc
//! <
//! Name=Song Title
//! Author=Somebody
//! >
//! ```
//!
//! Each path may be followed by one or more `<` ... `>` blocks of
//! `Name=Value` lines. Only the labels are kept; playback parameters
//! (chip type, frequencies, offsets) belong to the codec.

use super::Reference;
use crate::error::{ErrorKind, Result};

const SIGNATURE: &str = "ZX Spectrum Sound Chip Emulator Play List File v";
const PARAMETERS_BEGIN: &str = "<";
const PARAMETERS_END: &str = ">";

pub(super) fn parse(content: &[u8]) -> Result<Vec<Reference>> {
    // Versions before 6 were written in the local 8-bit code page; lossy is
    // the best we can do without guessing which one.
    let text = String::from_utf8_lossy(content);
    let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
    let header = lines.next().unwrap_or_default().trim_start_matches('\u{feff}');
    let version_ok = header
        .strip_prefix(SIGNATURE)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit());
    if !version_ok {
        exn::bail!(ErrorKind::Malformed("ayl"));
    }

    let mut references = Vec::new();
    let mut lines = lines.peekable();
    while let Some(line) = lines.next() {
        let path = line.trim();
        if path.is_empty() {
            continue;
        }
        let mut reference = Reference::new(path);
        while lines.next_if(|line| line.trim() == PARAMETERS_BEGIN).is_some() {
            for parameter in lines.by_ref() {
                let parameter = parameter.trim();
                if parameter == PARAMETERS_END {
                    break;
                }
                let Some((name, value)) = parameter.split_once('=') else {
                    continue;
                };
                match name {
                    "Name" => reference.title = Some(value.to_string()),
                    "Author" => reference.author = Some(value.to_string()),
                    _ => {},
                }
            }
        }
        references.push(reference);
    }
    Ok(references)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries_with_parameters() {
        let content = "ZX Spectrum Sound Chip Emulator Play List File v1.\r\n\
                       C:\\Music\\intro.pt3\r\n\
                       tunes\\song.stc\r\n\
                       <\r\n\
                       ChipType=AY\r\n\
                       Name=Song Title\r\n\
                       Author=Some=One\r\n\
                       >\r\n\
                       \r\n\
                       last.vtx\r\n";
        let references = parse(content.as_bytes()).unwrap();
        assert_eq!(references.len(), 3);
        assert_eq!(references[0], Reference::new("C:\\Music\\intro.pt3"));
        assert_eq!(references[1].location, "tunes\\song.stc");
        assert_eq!(references[1].title.as_deref(), Some("Song Title"));
        assert_eq!(references[1].author.as_deref(), Some("Some=One"));
        assert_eq!(references[2], Reference::new("last.vtx"));
    }

    #[test]
    fn test_multiple_parameter_blocks() {
        let content = "ZX Spectrum Sound Chip Emulator Play List File v6.\n\
                       a.ay\n<\nName=First\n>\n<\nAuthor=Later\n>\nb.ay\n";
        let references = parse(content.as_bytes()).unwrap();
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].title.as_deref(), Some("First"));
        assert_eq!(references[0].author.as_deref(), Some("Later"));
        assert_eq!(references[1].location, "b.ay");
    }

    #[test]
    fn test_rejects_unknown_header() {
        assert!(parse(b"#EXTM3U\nsong.mod\n").is_err());
        assert!(parse(b"ZX Spectrum Sound Chip Emulator Play List File vX\n").is_err());
        assert!(parse(b"").is_err());
    }
}
