use anyhow::Result;
use feed_rs::parser::Builder;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::normalize::{normalize_source, IntoFeedItem};
use super::types::{parse_loose_date, FeedItem, SourceFeed};

/// Parses RSS 0.9x/1.0/2.0 or Atom bytes into a [`SourceFeed`].
///
/// `feed_url` is recorded as each item's provenance. Items keep their date
/// exactly as the source wrote it in `date_string`. Items without a source
/// id get no `guid`, so renderers fall back to the link.
pub fn parse_feed(bytes: &[u8], feed_url: &str) -> Result<SourceFeed> {
    let feed = Builder::new()
        .timestamp_parser(parse_loose_date)
        // Leave missing ids empty rather than synthesizing a hash.
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)?;

    let title = feed
        .title
        .map(|t| t.content)
        .filter(|t| !t.trim().is_empty());
    let description = feed.description.map(|d| d.content);

    // The channel link is the website; skip any self-reference to the feed.
    let home_link = feed
        .links
        .iter()
        .find(|link| link.rel.as_deref() != Some("self") && link.href != feed_url)
        .map(|link| link.href.clone());

    let entry_count = feed.entries.len();
    let literals = literal_item_dates(bytes).filter(|dates| dates.len() == entry_count);
    if literals.is_none() && entry_count > 0 {
        tracing::debug!(url = %feed_url, "Source date strings unavailable for this document");
    }
    let mut literals = literals.unwrap_or_default().into_iter();

    let items: Vec<FeedItem> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let mut item = entry.into_feed_item();
            item.date_string = literals.next().flatten();
            item
        })
        .collect();

    Ok(normalize_source(
        title,
        description,
        home_link,
        feed_url,
        items,
    ))
}

/// Which date an element carries inside an item.
#[derive(Debug, Clone, Copy)]
enum DateSlot {
    Published,
    Updated,
}

impl DateSlot {
    fn for_element(local_name: &[u8]) -> Option<Self> {
        match local_name {
            b"pubDate" | b"published" | b"date" | b"issued" => Some(DateSlot::Published),
            b"updated" | b"modified" => Some(DateSlot::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct OpenItem {
    depth: usize,
    published: String,
    updated: String,
}

impl OpenItem {
    fn push(&mut self, slot: DateSlot, text: &str) {
        match slot {
            DateSlot::Published => self.published.push_str(text),
            DateSlot::Updated => self.updated.push_str(text),
        }
    }

    /// Publication date first, matching how the parsed instant is chosen.
    fn literal(self) -> Option<String> {
        [self.published, self.updated]
            .into_iter()
            .map(|d| d.trim().to_owned())
            .find(|d| !d.is_empty())
    }
}

fn is_item(local_name: &[u8]) -> bool {
    matches!(local_name, b"item" | b"entry")
}

/// The raw date text of every `<item>`/`<entry>`, in document order.
///
/// Only direct children of an item are read, so dates inside nested
/// elements such as Atom `<source>` are ignored. Returns `None` if the
/// document cannot be scanned; callers then go without literal dates.
fn literal_item_dates(bytes: &[u8]) -> Option<Vec<Option<String>>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut dates = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut item: Option<OpenItem> = None;
    let mut capture: Option<DateSlot> = None;

    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                match item.as_ref() {
                    None if is_item(name.as_ref()) => {
                        item = Some(OpenItem {
                            depth,
                            ..OpenItem::default()
                        });
                    }
                    Some(open) if depth == open.depth + 1 => {
                        capture = DateSlot::for_element(name.as_ref());
                    }
                    _ => {}
                }
            }
            Event::Empty(e) if item.is_none() && is_item(e.local_name().as_ref()) => {
                dates.push(None);
            }
            Event::Text(text) => {
                if let (Some(slot), Some(open)) = (capture, item.as_mut()) {
                    open.push(slot, &text.unescape().ok()?);
                }
            }
            Event::CData(cdata) => {
                if let (Some(slot), Some(open)) = (capture, item.as_mut()) {
                    open.push(slot, std::str::from_utf8(&cdata).ok()?);
                }
            }
            Event::End(_) => {
                capture = None;
                if item.as_ref().is_some_and(|open| open.depth == depth) {
                    dates.push(item.take().and_then(OpenItem::literal));
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Some(dates)
}
