//! Directory listings as served by common web servers.
//!
//! Three shapes are understood:
//!
//! - XML indexes: `<list><directory>..</directory><file size="..">..</file></list>`
//! - autoindex tables (Apache, lighttpd): one `<tr>` per entry
//! - autoindex `<pre>` blocks (older Apache): anchor followed by
//!   `date time size` as plain text
//!
//! The modification time ends up in the description; sizes are kept as the
//! server printed them.

use exn::ResultExt;
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use trove_vfs::{ErrorKind, Result, format};

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(ROW_SELECTOR, "tr");
selector!(CELL_SELECTOR, "td");
selector!(ANCHOR_SELECTOR, "a[href]");
selector!(PRE_ANCHOR_SELECTOR, "pre a[href]");

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: String,
    pub description: String,
}

/// Parse a listing page. Unknown layouts yield an empty listing.
pub fn parse(content: &[u8]) -> Result<Vec<ListingEntry>> {
    let text = String::from_utf8_lossy(content);
    let head = text.trim_start();
    if head.starts_with("<list") || (head.starts_with("<?xml") && !head.contains("<html")) {
        return parse_xml(&text);
    }
    let document = Html::parse_document(&text);
    let entries = parse_table(&document);
    if !entries.is_empty() {
        return Ok(entries);
    }
    Ok(parse_pre(&document))
}

fn parse_xml(text: &str) -> Result<Vec<ListingEntry>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut entries = Vec::new();
    let mut current: Option<ListingEntry> = None;
    loop {
        match reader.read_event().or_raise(|| ErrorKind::Backend("malformed xml listing".into()))? {
            Event::Start(tag) => {
                let is_dir = match tag.local_name().as_ref() {
                    b"directory" => true,
                    b"file" => false,
                    _ => continue,
                };
                let mut entry = ListingEntry {
                    name: String::new(),
                    is_dir,
                    size: String::new(),
                    description: String::new(),
                };
                for attribute in tag.attributes().flatten() {
                    let value = attribute.unescape_value().unwrap_or_default();
                    match attribute.key.local_name().as_ref() {
                        b"mtime" => entry.description = value.into_owned(),
                        b"size" if !is_dir => {
                            entry.size = value.parse::<u64>().map(format::size).unwrap_or_else(|_| value.into_owned())
                        },
                        _ => {},
                    }
                }
                current = Some(entry);
            },
            Event::Text(content) => {
                if let Some(entry) = current.as_mut() {
                    let content = content
                        .unescape()
                        .or_raise(|| ErrorKind::Backend("malformed xml listing".into()))?;
                    entry.name.push_str(&content);
                }
            },
            Event::End(_) => {
                if let Some(entry) = current.take()
                    && !entry.name.is_empty()
                {
                    entries.push(entry);
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(entries)
}

/// Name and kind from a listing link; `None` for navigation links (parent
/// directory, sort order, absolute links elsewhere).
fn entry_name(href: &str) -> Option<(String, bool)> {
    if href.starts_with(['?', '/', '#']) || href.starts_with("..") || href.contains("://") {
        return None;
    }
    let is_dir = href.ends_with('/');
    let name = percent_decode_str(href.trim_end_matches('/')).decode_utf8_lossy().into_owned();
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some((name, is_dir))
}

fn cell_text(cell: Option<&ElementRef<'_>>) -> String {
    cell.map(|cell| cell.text().collect::<String>().replace('\u{a0}', " ").trim().to_string())
        .unwrap_or_default()
}

fn clean_size(size: &str) -> String {
    match size.trim() {
        "-" => String::new(),
        size => size.to_string(),
    }
}

fn parse_table(document: &Html) -> Vec<ListingEntry> {
    let mut entries = Vec::new();
    for row in document.select(&ROW_SELECTOR) {
        let cells: Vec<_> = row.select(&CELL_SELECTOR).collect();
        let Some((index, href)) = cells.iter().enumerate().find_map(|(index, cell)| {
            let anchor = cell.select(&ANCHOR_SELECTOR).next()?;
            Some((index, anchor.value().attr("href")?.to_string()))
        }) else {
            continue;
        };
        let Some((name, is_dir)) = entry_name(&href) else {
            continue;
        };
        let size = if is_dir { String::new() } else { clean_size(&cell_text(cells.get(index + 2))) };
        entries.push(ListingEntry {
            name,
            is_dir,
            size,
            description: cell_text(cells.get(index + 1)),
        });
    }
    entries
}

fn parse_pre(document: &Html) -> Vec<ListingEntry> {
    let mut entries = Vec::new();
    for anchor in document.select(&PRE_ANCHOR_SELECTOR) {
        let Some((name, is_dir)) = anchor.value().attr("href").and_then(entry_name) else {
            continue;
        };
        let trailer = anchor
            .next_sibling()
            .and_then(|node| node.value().as_text().map(|text| text.to_string()))
            .unwrap_or_default();
        let fields: Vec<&str> = trailer.split_whitespace().collect();
        let description = fields.get(..2).map(|date_time| date_time.join(" ")).unwrap_or_default();
        let size = match (is_dir, fields.get(2)) {
            (false, Some(size)) => clean_size(size),
            _ => String::new(),
        };
        entries.push(ListingEntry {
            name,
            is_dir,
            size,
            description,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(entries: &[ListingEntry]) -> Vec<(String, bool, String, String)> {
        entries
            .iter()
            .map(|e| (e.name.clone(), e.is_dir, e.size.clone(), e.description.clone()))
            .collect()
    }

    fn entry(name: &str, is_dir: bool, size: &str, description: &str) -> (String, bool, String, String) {
        (name.to_string(), is_dir, size.to_string(), description.to_string())
    }

    #[test]
    fn test_xml_index() {
        let data = r#"<?xml version="1.0"?>
<list>
<directory mtime="2016-09-13T22:05:29Z">!MDScene_Arcade_VGM</directory>
<directory mtime="2018-06-27T07:25:08Z">x1</directory>
<file mtime="2018-06-27T06:24:42Z" size="1578655">hoot_2018-06-26.7z</file>
</list>"#;
        let entries = parse(data.as_bytes()).unwrap();
        assert_eq!(
            summary(&entries),
            vec![
                entry("!MDScene_Arcade_VGM", true, "", "2016-09-13T22:05:29Z"),
                entry("x1", true, "", "2018-06-27T07:25:08Z"),
                entry("hoot_2018-06-26.7z", false, "1.5M", "2018-06-27T06:24:42Z"),
            ]
        );
    }

    #[test]
    fn test_apache_table() {
        let data = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html><head><title>Index of /some/page</title></head><body>
<h1>Index of /some/page</h1>
<table>
<tr><th valign="top"><img src="/icons/blank.gif" alt="[ICO]"></th><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th><th><a href="?C=S;O=A">Size</a></th><th><a href="?C=D;O=A">Description</a></th></tr>
<tr><th colspan="5"><hr></th></tr>
<tr><td valign="top"><img src="/icons/back.gif" alt="[PARENTDIR]"></td><td><a href="/ayon/">Parent Directory</a>       </td><td>&nbsp;</td><td align="right">  - </td><td>&nbsp;</td></tr>
<tr><td valign="top"><img src="/icons/folder.gif" alt="[DIR]"></td><td><a href="scene_cpc/">scene_cpc/</a>             </td><td align="right">2018-02-22 00:31  </td><td align="right">  - </td><td>&nbsp;</td></tr>
<tr><td valign="top"><img src="/icons/unknown.gif" alt="[   ]"></td><td><a href="AT.ay">AT.ay</a>                  </td><td align="right">2018-04-25 03:13  </td><td align="right">7.1K</td><td>&nbsp;</td></tr>
<tr><th colspan="5"><hr></th></tr>
</table></body></html>"#;
        let entries = parse(data.as_bytes()).unwrap();
        assert_eq!(
            summary(&entries),
            vec![
                entry("scene_cpc", true, "", "2018-02-22 00:31"),
                entry("AT.ay", false, "7.1K", "2018-04-25 03:13"),
            ]
        );
    }

    #[test]
    fn test_lighttpd_table() {
        let data = r#"<!DOCTYPE html><html><head><title>Index of /pub/music/groups/2063music/</title></head><body>
<div class="list"><table summary="Directory Listing" cellpadding="0" cellspacing="0">
<thead><tr><th class="n">Name</th><th class="m">Last Modified</th><th class="s">Size</th><th class="t">Type</th></tr></thead>
<tbody>
<tr class="d"><td class="n"><a href="../">..</a>/</td><td class="m">&nbsp;</td><td class="s">- &nbsp;</td><td class="t">Directory</td></tr>
<tr class="d"><td class="n"><a href="020200/">020200</a>/</td><td class="m">2002-Jul-10 19:36:52</td><td class="s">- &nbsp;</td><td class="t">Directory</td></tr>
<tr><td class="n"><a href="2063music.txt">2063music.txt</a></td><td class="m">2004-Jun-09 14:19:52</td><td class="s">0.6K</td><td class="t">text/plain</td></tr>
<tr><td class="n"><a href="63%20opal.mp3">63 opal.mp3</a></td><td class="m">2000-Jun-22 03:23:54</td><td class="s">5.1M</td><td class="t">audio/mpeg</td></tr></tbody>
</table></div></body></html>"#;
        let entries = parse(data.as_bytes()).unwrap();
        assert_eq!(
            summary(&entries),
            vec![
                entry("020200", true, "", "2002-Jul-10 19:36:52"),
                entry("2063music.txt", false, "0.6K", "2004-Jun-09 14:19:52"),
                entry("63 opal.mp3", false, "5.1M", "2000-Jun-22 03:23:54"),
            ]
        );
    }

    #[test]
    fn test_pre_index() {
        let data = "<html><head><title>Index of /</title></head><body>\n<h1>Index of /</h1>\n\
<pre><img src=\"/icons/blank.gif\" alt=\"Icon \"> <a href=\"?C=N;O=D\">Name</a>                    <a href=\"?C=M;O=A\">Last modified</a>      <a href=\"?C=S;O=A\">Size</a><hr>\
<img src=\"/icons/folder.gif\" alt=\"[DIR]\"> <a href=\"!MDScene_Arcade_VGM/\">!MDScene_Arcade_VGM/</a>    2016-09-13 18:05    -   \n\
<img src=\"/icons/unknown.gif\" alt=\"[   ]\"> <a href=\"hoot_2018-06-26.7z\">hoot_2018-06-26.7z</a>      2018-06-27 02:24  1.5M  <span class='description'>7-Zip Archive</span>\n\
<hr></pre></body></html>";
        let entries = parse(data.as_bytes()).unwrap();
        assert_eq!(
            summary(&entries),
            vec![
                entry("!MDScene_Arcade_VGM", true, "", "2016-09-13 18:05"),
                entry("hoot_2018-06-26.7z", false, "1.5M", "2018-06-27 02:24"),
            ]
        );
    }

    #[test]
    fn test_unknown_page_is_empty() {
        assert!(parse(b"<html><body><p>Nothing here</p></body></html>").unwrap().is_empty());
    }

    #[test]
    fn test_broken_xml() {
        let err = parse(b"<list><file size=\"1\">a</directory></list>").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend(_)));
    }
}
