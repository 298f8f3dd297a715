use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use super::{anchor_title, GENERATOR};
use crate::feed::{FeedItem, MergedFeed};
use crate::util::{sanitize_text, strip_control_chars};

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Renders a merged feed as an RSS 2.0 document.
///
/// Linked titles, HTML bodies and authors are written as CDATA so their
/// markup reaches the reader unchanged. Every other value is entity-escaped.
/// Characters XML 1.0 forbids are dropped from all item text.
/// The output is not indented: whitespace around CDATA would become part of
/// the element's text.
pub fn render_rss(feed: &MergedFeed, built_at: DateTime<Utc>) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &feed.title)?;
    text_element(&mut writer, "description", &feed.description)?;
    text_element(&mut writer, "link", &feed.link)?;

    let mut self_link = BytesStart::new("atom:link");
    self_link.push_attribute(("href", feed.link.as_str()));
    self_link.push_attribute(("rel", "self"));
    self_link.push_attribute(("type", "application/rss+xml"));
    writer.write_event(Event::Empty(self_link))?;

    text_element(&mut writer, "lastBuildDate", &built_at.to_rfc2822())?;
    text_element(&mut writer, "generator", GENERATOR)?;

    for item in &feed.items {
        write_item(&mut writer, item)
            .with_context(|| format!("Failed to write item {:?}", item.id()))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("Generated RSS contains invalid UTF-8")
}

fn write_item(writer: &mut XmlWriter, item: &FeedItem) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    let title = anchor_title(item).unwrap_or_default();
    if item.link.as_deref().is_some_and(|l| !l.is_empty()) {
        cdata_element(writer, "title", &title)?;
    } else {
        text_element(writer, "title", &title)?;
    }

    if let Some(link) = &item.link {
        text_element(writer, "link", link)?;
    }

    if let Some(content) = &item.content {
        cdata_element(writer, "description", content)?;
    } else if let Some(summary) = &item.plain_summary {
        text_element(writer, "description", &sanitize_text(summary))?;
    }

    let mut guid = BytesStart::new("guid");
    match (item.guid.as_deref().filter(|g| !g.is_empty()), item.id()) {
        (Some(_), _) => guid.push_attribute(("isPermaLink", "false")),
        (None, Some(_)) => guid.push_attribute(("isPermaLink", "true")),
        (None, None) => {}
    }
    writer.write_event(Event::Start(guid))?;
    writer.write_event(Event::Text(BytesText::new(&strip_control_chars(
        item.id().unwrap_or(""),
    ))))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;

    // The source's own date string wins; the parsed instant is the fallback.
    let pub_date = item
        .date_string
        .clone()
        .or_else(|| item.published_at.map(|dt| dt.to_rfc2822()));
    if let Some(pub_date) = pub_date {
        text_element(writer, "pubDate", &pub_date)?;
    }

    if let Some(author) = &item.author {
        cdata_element(writer, "author", author)?;
    }

    for category in &item.categories {
        text_element(writer, "category", category)?;
    }

    if let Some(source_url) = &item.source_feed_url {
        let source_url = strip_control_chars(source_url);
        let mut source = BytesStart::new("source");
        source.push_attribute(("url", &*source_url));
        writer.write_event(Event::Start(source))?;
        writer.write_event(Event::Text(BytesText::new(&strip_control_chars(
            item.source_feed_title.as_deref().unwrap_or(&source_url),
        ))))?;
        writer.write_event(Event::End(BytesEnd::new("source")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// `<name>escaped text</name>`
fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&strip_control_chars(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// `<name><![CDATA[raw]]></name>`, splitting the section wherever `raw`
/// contains the terminator `]]>`.
fn cdata_element(writer: &mut XmlWriter, name: &str, raw: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    let raw = strip_control_chars(raw);
    let mut rest = raw.as_ref();
    while let Some(pos) = rest.find("]]>") {
        writer.write_event(Event::CData(BytesCData::new(&rest[..pos + 2])))?;
        rest = &rest[pos + 2..];
    }
    writer.write_event(Event::CData(BytesCData::new(rest)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
