//! Forward-only walk over an XML response body.
//!
//! Wraps a `quick_xml` pull reader with the handful of operations the
//! provider parsers need: step to the next start or end tag, read the text
//! of the element just opened, and read its attributes. A syntax error
//! ends the walk; whatever was read up to that point stays valid.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tag {
    Open(Element),
    Close(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    empty: bool,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, empty: bool) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attributes = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                (key, value)
            })
            .collect();

        Self {
            name,
            attributes,
            empty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `<tag/>`: there is no body and no matching close tag.
    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

pub(crate) struct XmlStream<'a> {
    reader: Reader<&'a [u8]>,
    /// The last opened element was self-closing, so it has no text.
    last_empty: bool,
    finished: bool,
}

impl<'a> XmlStream<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(body);
        reader.trim_text(true);
        Self {
            reader,
            last_empty: false,
            finished: false,
        }
    }

    /// Next start or end tag in document order, or `None` at the end of
    /// the document (or at the first syntax error).
    pub fn next_tag(&mut self) -> Option<Tag> {
        while !self.finished {
            match self.reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    self.last_empty = false;
                    return Some(Tag::Open(Element::from_start(e, false)));
                }
                Ok(Event::Empty(ref e)) => {
                    self.last_empty = true;
                    return Some(Tag::Open(Element::from_start(e, true)));
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Some(Tag::Close(name));
                }
                Ok(Event::Eof) => self.finished = true,
                Err(e) => {
                    debug!(
                        position = self.reader.buffer_position(),
                        error = %e,
                        "stopping at malformed XML"
                    );
                    self.finished = true;
                }
                _ => {}
            }
        }
        None
    }

    /// Text content of the element returned by the preceding
    /// [`next_tag`](Self::next_tag), consuming everything up to and
    /// including its close tag. Text of nested children is concatenated.
    /// An element cut off by the end of the document reads as empty.
    pub fn read_text(&mut self) -> String {
        let mut text = String::new();
        if self.last_empty {
            self.last_empty = false;
            return text;
        }

        let mut depth = 0usize;
        while !self.finished {
            match self.reader.read_event() {
                Ok(Event::Text(e)) => match e.unescape() {
                    Ok(chunk) => text.push_str(&chunk),
                    Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
                },
                Ok(Event::CData(e)) => {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()))
                }
                Ok(Event::Start(_)) => depth += 1,
                Ok(Event::End(_)) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    text.clear();
                }
                Err(e) => {
                    debug!(
                        position = self.reader.buffer_position(),
                        error = %e,
                        "stopping at malformed XML"
                    );
                    self.finished = true;
                    text.clear();
                }
                _ => {}
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_name(tag: Option<Tag>) -> String {
        match tag {
            Some(Tag::Open(el)) => el.name().to_string(),
            other => panic!("expected an open tag, got {other:?}"),
        }
    }

    #[test]
    fn walks_tags_in_document_order() {
        let mut xml = XmlStream::new(b"<a><b>one</b><c x=\"1\"/></a>");

        assert_eq!(open_name(xml.next_tag()), "a");
        assert_eq!(open_name(xml.next_tag()), "b");
        assert_eq!(xml.read_text(), "one");

        match xml.next_tag() {
            Some(Tag::Open(el)) => {
                assert!(el.is_empty());
                assert_eq!(el.attribute("x"), Some("1"));
                assert_eq!(el.attribute("y"), None);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(xml.read_text(), "");
        assert_eq!(xml.next_tag(), Some(Tag::Close("a".into())));
        assert_eq!(xml.next_tag(), None);
    }

    #[test]
    fn text_is_unescaped() {
        let mut xml = XmlStream::new(b"<full>Fish &amp; Chips, UK</full>");
        xml.next_tag();
        assert_eq!(xml.read_text(), "Fish & Chips, UK");
    }

    #[test]
    fn truncated_element_reads_empty() {
        let mut xml = XmlStream::new(b"<a><b>101");
        xml.next_tag();
        xml.next_tag();
        assert_eq!(xml.read_text(), "");
        assert_eq!(xml.next_tag(), None);
    }

    #[test]
    fn malformed_document_ends_the_walk() {
        let mut xml = XmlStream::new(b"<a><b>1</b></c>");
        assert_eq!(open_name(xml.next_tag()), "a");
        assert_eq!(open_name(xml.next_tag()), "b");
        assert_eq!(xml.read_text(), "1");
        assert_eq!(xml.next_tag(), None);
        assert_eq!(xml.next_tag(), None);
    }
}
