use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Body is not well-formed XML
    #[error("malformed feed document: {0}")]
    Malformed(String),
    /// Root element is something other than `<rss>`
    #[error("not an RSS document: root element is <{0}>")]
    NotRss(String),
    #[error("RSS document has no <channel>")]
    MissingChannel,
}

/// A decoded RSS channel. Lives for one aggregation cycle only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub entries: Vec<ParsedEntry>,
}

/// One `<item>` of the channel, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `<pubDate>` text; empty when the item has none
    pub pub_date: String,
    pub guid: String,
    /// Category labels in document order; repeats are kept
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    Guid,
    Category,
}

impl Field {
    fn of_channel(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }

    fn of_item(name: &[u8]) -> Option<Self> {
        match name {
            b"pubDate" => Some(Field::PubDate),
            b"guid" => Some(Field::Guid),
            b"category" => Some(Field::Category),
            other => Self::of_channel(other),
        }
    }
}

/// Text being collected for one field element.
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

/// Decode an RSS 2.0 document.
///
/// Elements are matched by their qualified name, so extension elements such
/// as `<atom:link>` or `<media:title>` never collide with the RSS fields of
/// the same local name; they are skipped. A field that appears twice keeps
/// its last value.
///
/// XML entities are resolved by the XML reader; channel and item titles and
/// descriptions then go through HTML entity decoding as well, because feeds
/// routinely escape twice (`&amp;amp;`, `&amp;#8217;`).
///
/// # Errors
///
/// - [`ParseError::Malformed`] if the bytes are not well-formed XML
/// - [`ParseError::NotRss`] / [`ParseError::MissingChannel`] if the document
///   lacks an `<rss><channel>` structure
pub fn parse_document(bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    // Qualified names of the open elements, root first
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut document = ParsedDocument::default();
    let mut saw_channel = false;
    let mut item: Option<ParsedEntry> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if path.is_empty() && name != b"rss" {
                    return Err(ParseError::NotRss(String::from_utf8_lossy(&name).into_owned()));
                }

                let field = match path.len() {
                    1 if name == b"channel" => {
                        saw_channel = true;
                        None
                    }
                    2 if in_channel(&path) && name == b"item" => {
                        item = Some(ParsedEntry::default());
                        None
                    }
                    2 if in_channel(&path) => Field::of_channel(&name),
                    3 if in_channel(&path) && path[2] == b"item" => Field::of_item(&name),
                    _ => None,
                };

                path.push(name);
                if let (Some(field), None) = (field, &capture) {
                    capture = Some(Capture {
                        field,
                        depth: path.len(),
                        text: String::new(),
                    });
                }
            }
            Ok(Event::Empty(e)) => {
                let qname = e.name();
                let name = qname.as_ref();
                if path.is_empty() && name != b"rss" {
                    return Err(ParseError::NotRss(String::from_utf8_lossy(name).into_owned()));
                }
                if path.len() == 2 && in_channel(&path) && name == b"item" {
                    document.entries.push(ParsedEntry::default());
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(capture) = capture.as_mut() {
                    // Undeclared entities (`&nbsp;`) are left for HTML decoding
                    match e.unescape() {
                        Ok(text) => capture.text.push_str(&text),
                        Err(_) => capture.text.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                if capture.as_ref().is_some_and(|c| c.depth == path.len()) {
                    if let Some(done) = capture.take() {
                        assign(done.field, done.text, item.as_mut(), &mut document);
                    }
                }
                if let Some(name) = path.pop() {
                    if path.len() == 2 && name == b"item" {
                        if let Some(entry) = item.take() {
                            document.entries.push(entry);
                        }
                    }
                }
            }
            Ok(Event::Eof) => {
                if !path.is_empty() {
                    return Err(ParseError::Malformed(
                        "unexpected end of document".to_string(),
                    ));
                }
                break;
            }
            Err(e) => {
                return Err(ParseError::Malformed(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    document.title = unescape(&document.title);
    document.link = document.link.trim().to_string();
    document.description = unescape(&document.description);
    for entry in &mut document.entries {
        entry.title = unescape(&entry.title);
        entry.link = entry.link.trim().to_string();
        entry.description = unescape(&entry.description);
        entry.pub_date = entry.pub_date.trim().to_string();
        entry.guid = entry.guid.trim().to_string();
    }

    Ok(document)
}

fn in_channel(path: &[Vec<u8>]) -> bool {
    path.len() >= 2 && path[1] == b"channel"
}

fn assign(
    field: Field,
    text: String,
    item: Option<&mut ParsedEntry>,
    document: &mut ParsedDocument,
) {
    match item {
        Some(entry) => match field {
            Field::Title => entry.title = text,
            Field::Link => entry.link = text,
            Field::Description => entry.description = text,
            Field::PubDate => entry.pub_date = text,
            Field::Guid => entry.guid = text,
            Field::Category => entry.categories.push(text.trim().to_string()),
        },
        None => match field {
            Field::Title => document.title = text,
            Field::Link => document.link = text,
            Field::Description => document.description = text,
            _ => {}
        },
    }
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
    <title>Boot.dev &amp;amp; Friends</title>
    <link>https://blog.example.com</link>
    <description>Notes &amp;lt;on&amp;gt; things</description>
    <language>en-us</language>
    <item>
        <title>First &amp;#8220;post&amp;#8221;</title>
        <link>
            https://blog.example.com/first
        </link>
        <description><![CDATA[<p>Hello &amp; welcome</p>]]></description>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
        <guid isPermaLink="false">first-guid</guid>
        <category domain="tags">rust</category>
        <category>web</category>
        <category>rust</category>
    </item>
    <item>
        <title>Second</title>
        <link>https://blog.example.com/second</link>
    </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_channel_metadata() {
        let doc = parse_document(SAMPLE.as_bytes()).unwrap();
        assert_eq!(doc.title, "Boot.dev & Friends");
        assert_eq!(doc.link, "https://blog.example.com");
        assert_eq!(doc.description, "Notes <on> things");
        assert_eq!(doc.entries.len(), 2);
    }

    #[test]
    fn test_parse_items_in_document_order() {
        let doc = parse_document(SAMPLE.as_bytes()).unwrap();
        let first = &doc.entries[0];

        assert_eq!(first.title, "First \u{201c}post\u{201d}");
        assert_eq!(first.link, "https://blog.example.com/first");
        assert_eq!(first.description, "<p>Hello & welcome</p>");
        assert_eq!(first.pub_date, "Mon, 02 Jan 2006 15:04:05 -0700");
        assert_eq!(first.guid, "first-guid");
        // Repeated labels are preserved
        assert_eq!(first.categories, vec!["rust", "web", "rust"]);

        let second = &doc.entries[1];
        assert_eq!(second.title, "Second");
        assert_eq!(second.description, "");
        assert_eq!(second.pub_date, "");
        assert!(second.categories.is_empty());
    }

    #[test]
    fn test_namespaced_elements_do_not_collide() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
<channel>
    <title>WordPress Site</title>
    <atom:link href="https://wp.example.com/feed/" rel="self" type="application/rss+xml"/>
    <link>https://wp.example.com</link>
    <item>
        <title>Real title</title>
        <media:title>Thumbnail caption</media:title>
        <link>https://wp.example.com/post</link>
        <media:content url="https://wp.example.com/img.jpg"><media:title>Nested</media:title></media:content>
    </item>
</channel>
</rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.link, "https://wp.example.com");
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].title, "Real title");
        assert_eq!(doc.entries[0].link, "https://wp.example.com/post");
    }

    #[test]
    fn test_repeated_field_keeps_last_value() {
        let xml = r#"<rss><channel><title>A</title><title>B</title></channel></rss>"#;
        assert_eq!(parse_document(xml.as_bytes()).unwrap().title, "B");
    }

    #[test]
    fn test_undeclared_entity_left_for_html_decoding() {
        let xml = r#"<rss><channel><item><title>a&nbsp;b</title></item></channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].title, "a\u{a0}b");
    }

    #[test]
    fn test_empty_channel() {
        let doc = parse_document(
            br#"<?xml version="1.0"?><rss version="2.0"><channel><title>Empty</title></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(doc.title, "Empty");
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            parse_document(b"<not valid xml"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_document(b"<rss><channel><item><title>cut off"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_document_without_channel() {
        let html = b"<html><head><title>Not a feed</title></head><body></body></html>";
        assert!(matches!(parse_document(html), Err(ParseError::NotRss(_))));
        assert!(matches!(
            parse_document(b"<rss version=\"2.0\"></rss>"),
            Err(ParseError::MissingChannel)
        ));
    }

    #[test]
    fn test_empty_body() {
        assert!(parse_document(b"").is_err());
    }
}
