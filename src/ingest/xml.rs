// src/ingest/xml.rs
//! Lenient RSS/Atom item reader.
//!
//! Upstream feeds are regularly malformed (mismatched end tags, stray HTML,
//! undeclared entities), so this does not validate. A streaming pass over the
//! whole document runs first; if quick-xml still gives up, the document is cut
//! into `<item>`/`<entry>` segments and each is read on its own, dropping only
//! the segments that fail. Entities are left raw here and decoded by
//! [`crate::ingest::clean`].

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, warn};

use crate::ingest::types::RawItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    ContentEncoded,
    PubDate,
    DcDate,
}

fn field_for(name: &str) -> Option<Field> {
    match name {
        "title" => Some(Field::Title),
        "link" => Some(Field::Link),
        "description" | "summary" => Some(Field::Description),
        "content:encoded" | "content" => Some(Field::ContentEncoded),
        "pubdate" | "published" => Some(Field::PubDate),
        "dc:date" | "updated" => Some(Field::DcDate),
        _ => None,
    }
}

fn slot(item: &mut RawItem, field: Field) -> &mut Option<String> {
    match field {
        Field::Title => &mut item.title,
        Field::Link => &mut item.link,
        Field::Description => &mut item.description,
        Field::ContentEncoded => &mut item.content_encoded,
        Field::PubDate => &mut item.pub_date,
        Field::DcDate => &mut item.dc_date,
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn is_item_tag(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// Atom `<link href=..>`: only the alternate (or unlabelled) link counts.
fn atom_href(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel_ok = true;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => href = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            b"rel" => rel_ok = attr.value.as_ref() == b"alternate",
            _ => {}
        }
    }
    href.filter(|_| rel_ok)
}

#[derive(Default)]
struct ItemState {
    item: RawItem,
    depth: usize,
    current: Option<Field>,
}

impl ItemState {
    fn open_child(&mut self, e: &BytesStart<'_>, empty: bool) {
        // nested markup inside a field keeps feeding that field
        if empty && self.depth > 0 {
            return;
        }
        if !empty {
            self.depth += 1;
            if self.depth > 1 {
                return;
            }
        }
        let Some(field) = field_for(&local_name(e)) else {
            self.current = None;
            return;
        };
        if field == Field::Link {
            if let Some(href) = atom_href(e) {
                if self.item.link.is_none() {
                    self.item.link = Some(href);
                }
            }
        }
        if empty {
            return;
        }
        let taken = slot(&mut self.item, field)
            .as_ref()
            .is_some_and(|v| !v.trim().is_empty());
        self.current = if taken { None } else { Some(field) };
    }

    fn close_child(&mut self) {
        if self.depth == 1 {
            self.current = None;
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn push_text(&mut self, text: &str) {
        if let Some(field) = self.current {
            let s = slot(&mut self.item, field).get_or_insert_with(String::new);
            if !s.is_empty() {
                s.push(' ');
            }
            s.push_str(text);
        }
    }
}

/// Single streaming pass. Errors bubble so the caller can fall back.
fn stream_items(xml: &str) -> Result<Vec<RawItem>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    {
        let cfg = reader.config_mut();
        cfg.trim_text(true);
        cfg.check_end_names = false;
    }

    let mut out = Vec::new();
    let mut state: Option<ItemState> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                match state.as_mut() {
                    None if is_item_tag(&name) => state = Some(ItemState::default()),
                    Some(st) => st.open_child(&e, false),
                    None => {}
                }
            }
            Event::Empty(e) => {
                if let Some(st) = state.as_mut() {
                    st.open_child(&e, true);
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if let Some(st) = state.as_mut() {
                    if st.depth == 0 && is_item_tag(&name) {
                        if let Some(done) = state.take() {
                            out.push(done.item);
                        }
                    } else {
                        st.close_child();
                    }
                }
            }
            Event::Text(t) => {
                if let Some(st) = state.as_mut() {
                    let raw = t.into_inner();
                    st.push_text(&String::from_utf8_lossy(&raw));
                }
            }
            Event::CData(c) => {
                if let Some(st) = state.as_mut() {
                    let raw = c.into_inner();
                    st.push_text(&String::from_utf8_lossy(&raw));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Unterminated trailing item still carries data
    if let Some(st) = state {
        if st.item.title.is_some() || st.item.link.is_some() {
            out.push(st.item);
        }
    }
    Ok(out)
}

static RE_ITEM_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item\b[^>]*>.*?</item\s*>").unwrap());
static RE_ENTRY_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<entry\b[^>]*>.*?</entry\s*>").unwrap());

/// Cut the document into item-sized pieces. Non-validating: a literal
/// `<item>` inside payload text would split early.
pub fn split_segments(xml: &str) -> Vec<&str> {
    let items: Vec<&str> = RE_ITEM_SEGMENT.find_iter(xml).map(|m| m.as_str()).collect();
    if !items.is_empty() {
        return items;
    }
    RE_ENTRY_SEGMENT.find_iter(xml).map(|m| m.as_str()).collect()
}

/// Read every item the document yields. Never fails.
pub fn parse_items(xml: &str) -> Vec<RawItem> {
    match stream_items(xml) {
        Ok(items) => items,
        Err(e) => {
            warn!(target: "ingest", error = %e, "streaming parse failed, falling back to per-item segments");
            let mut out = Vec::new();
            for (idx, seg) in split_segments(xml).into_iter().enumerate() {
                match stream_items(seg) {
                    Ok(mut v) => out.append(&mut v),
                    Err(e) => debug!(target: "ingest", index = idx, error = %e, "dropping unreadable item"),
                }
            }
            out
        }
    }
}
