/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use quick_xml::Reader;
use quick_xml::errors::SyntaxError;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;

use crate::Element;

use super::StreamError;
use super::constants::STREAM_NS;
use super::error::description;

/// A top level event of the incoming XML stream.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum StreamElement {
    /// The opening `<stream:stream>` tag with its attributes.
    Start(Element),
    /// A complete top level element: a stanza or a stream level signal.
    Element(Element),
    /// The closing `</stream:stream>` tag.
    End,
}

type Declarations = Vec<(String, String)>;

/// Largest top level element accepted by default.
pub const DEFAULT_MAX_ELEMENT_SIZE: usize = 1024 * 1024;

// Where the search for the end of the current top level element stands.
// Only the raw markup boundaries are tracked here, the element is built
// once its end tag is buffered.
#[derive(Debug, Default)]
struct Framing {
    offset: usize,
    open: Vec<Vec<u8>>,
}

/// Incremental stream parser.
///
/// Bytes are buffered until a complete top level element is available, so
/// the element handed out is always a whole subtree. Namespace declarations
/// made on the stream header stay in scope for every following element.
pub struct StreamParser {
    buffer: Vec<u8>,
    framing: Framing,
    max_element_size: usize,
    header_scope: Declarations,
    started: bool,
    ended: bool,
}

enum Scanned {
    Header(Element, Declarations),
    Element(Element),
    End,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::with_max_element_size(DEFAULT_MAX_ELEMENT_SIZE)
    }

    /// Parser rejecting top level elements bigger than `max` bytes.
    pub fn with_max_element_size(max: usize) -> Self {
        Self {
            buffer: Vec::new(),
            framing: Framing::default(),
            max_element_size: max,
            header_scope: Vec::new(),
            started: false,
            ended: false,
        }
    }

    pub fn max_element_size(&self) -> usize {
        self.max_element_size
    }

    /// Forgets all buffered bytes and the current stream context.
    ///
    /// Used when the stream restarts after TLS negotiation or SASL
    /// success. Bytes received before the reset never reach the new stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.framing = Framing::default();
        self.header_scope.clear();
        self.started = false;
        self.ended = false;
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        if !self.ended {
            self.buffer.extend_from_slice(bytes);
        }
    }

    /// Number of bytes waiting for the rest of an element.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn elements<'a>(&'a mut self, bytes: &[u8]) -> StreamElements<'a> {
        self.feed(bytes);
        StreamElements { parser: self }
    }

    /// Returns the next complete element, or None if more bytes are needed.
    pub fn next_element(&mut self) -> Result<Option<StreamElement>, StreamError> {
        if self.ended {
            return Ok(None);
        }
        let skip = self
            .buffer
            .iter()
            .position(|c| !c.is_ascii_whitespace())
            .unwrap_or(self.buffer.len());
        self.buffer.drain(..skip);
        self.framing.offset = self.framing.offset.saturating_sub(skip);
        if self.buffer.is_empty() {
            return Ok(None);
        }

        if self.buffer.starts_with(b"</") {
            if !self.started {
                self.ended = true;
                return Err(StreamError::BadStream(description::NO_STREAM));
            }
            return match self.buffer.iter().position(|c| *c == b'>') {
                Some(pos) => {
                    self.buffer.drain(..=pos);
                    self.ended = true;
                    Ok(Some(StreamElement::End))
                }
                None => Ok(None),
            };
        }

        let (scanned, consumed) = loop {
            let Some(end) = self.frame() else {
                if self.buffer.len() > self.max_element_size {
                    self.ended = true;
                    return Err(StreamError::ElementTooLarge(self.max_element_size));
                }
                return Ok(None);
            };
            if end > self.max_element_size {
                self.ended = true;
                return Err(StreamError::ElementTooLarge(self.max_element_size));
            }
            match self.scan(&self.buffer[..end]) {
                Ok(Some(result)) => break result,
                // An open top level tag which is not the stream header
                Ok(None) => continue,
                Err(err) => {
                    self.ended = true;
                    return Err(err);
                }
            }
        };
        self.buffer.drain(..consumed);
        self.framing = Framing::default();
        let element = match scanned {
            Scanned::Header(header, declarations) => {
                self.header_scope = declarations;
                self.started = true;
                StreamElement::Start(header)
            }
            Scanned::Element(element) => {
                if !self.started {
                    self.ended = true;
                    return Err(StreamError::BadStream(description::NO_STREAM));
                }
                StreamElement::Element(element)
            }
            Scanned::End => {
                self.ended = true;
                StreamElement::End
            }
        };
        Ok(Some(element))
    }

    /// Advances over the buffered markup. Returns the length of the buffer
    /// prefix worth building: a complete top level element, an opening top
    /// level tag, or an end tag which does not match.
    fn frame(&mut self) -> Option<usize> {
        let data = &self.buffer;
        let framing = &mut self.framing;
        while framing.offset < data.len() {
            let Some(lt) = data[framing.offset..].iter().position(|c| *c == b'<') else {
                framing.offset = data.len();
                return None;
            };
            let start = framing.offset + lt;
            let Some(len) = markup_len(&data[start..]) else {
                // Partial markup, look at it again with the next bytes
                framing.offset = start;
                return None;
            };
            let end = start + len;
            framing.offset = end;
            let markup = &data[start..end];
            if markup.starts_with(b"</") {
                match framing.open.pop() {
                    Some(open) if open.as_slice() == tag_name(&markup[2..]) => {
                        if framing.open.is_empty() {
                            return Some(end);
                        }
                    }
                    // The reader reports the mismatch
                    _ => return Some(end),
                }
            } else if markup.starts_with(b"<!") || markup.starts_with(b"<?") {
                continue;
            } else if markup.ends_with(b"/>") {
                if framing.open.is_empty() {
                    return Some(end);
                }
            } else {
                let top = framing.open.is_empty();
                framing.open.push(tag_name(&markup[1..]).to_vec());
                if top {
                    return Some(end);
                }
            }
        }
        None
    }

    fn scan(&self, data: &[u8]) -> Result<Option<(Scanned, usize)>, StreamError> {
        let mut reader = Reader::from_reader(data);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<(Element, Declarations)> = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Decl(_)) | Ok(Event::PI(_)) | Ok(Event::Comment(_))
                | Ok(Event::DocType(_)) => continue,
                Ok(Event::Start(start)) => {
                    let (element, declarations) = self.build_element(&start, &stack)?;
                    if stack.is_empty() && is_stream_header(&element) {
                        let consumed = reader.buffer_position() as usize;
                        return Ok(Some((Scanned::Header(element, declarations), consumed)));
                    }
                    stack.push((element, declarations));
                }
                Ok(Event::Empty(start)) => {
                    let (element, declarations) = self.build_element(&start, &stack)?;
                    match stack.last_mut() {
                        Some((parent, _)) => {
                            parent.push_child(element);
                        }
                        None => {
                            let consumed = reader.buffer_position() as usize;
                            if is_stream_header(&element) {
                                return Ok(Some((
                                    Scanned::Header(element, declarations),
                                    consumed,
                                )));
                            }
                            return Ok(Some((Scanned::Element(element), consumed)));
                        }
                    }
                }
                Ok(Event::Text(text)) => {
                    if reader.buffer_position() as usize >= data.len() {
                        // Text may continue in the next read
                        return Ok(None);
                    }
                    if let Some((parent, _)) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|_| StreamError::BadXml(description::BAD_ENTITY))?;
                        parent.append_text(&text);
                    }
                }
                Ok(Event::CData(cdata)) => {
                    if let Some((parent, _)) = stack.last_mut() {
                        let text = std::str::from_utf8(&cdata)
                            .map_err(|_| StreamError::BadXml(description::BAD_ENCODING))?;
                        parent.append_text(text);
                    }
                }
                Ok(Event::End(_)) => match stack.pop() {
                    Some((element, _)) => match stack.last_mut() {
                        Some((parent, _)) => {
                            parent.push_child(element);
                        }
                        None => {
                            let consumed = reader.buffer_position() as usize;
                            return Ok(Some((Scanned::Element(element), consumed)));
                        }
                    },
                    None => {
                        let consumed = reader.buffer_position() as usize;
                        return Ok(Some((Scanned::End, consumed)));
                    }
                },
                Ok(Event::Eof) => return Ok(None),
                Err(quick_xml::Error::Syntax(
                    SyntaxError::UnclosedTag
                    | SyntaxError::UnclosedPIOrXmlDecl
                    | SyntaxError::UnclosedComment
                    | SyntaxError::UnclosedDoctype
                    | SyntaxError::UnclosedCData,
                )) => {
                    // Partial markup at the end of the buffer
                    return Ok(None);
                }
                Err(_) => return Err(StreamError::BadXml(description::UNCLOSED_MARKUP)),
            }
        }
    }

    fn build_element(
        &self,
        start: &BytesStart,
        stack: &[(Element, Declarations)],
    ) -> Result<(Element, Declarations), StreamError> {
        let qname = std::str::from_utf8(start.name().as_ref())
            .map_err(|_| StreamError::BadXml(description::BAD_ENCODING))?
            .to_string();
        let mut declarations = Declarations::new();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|_| StreamError::BadXml(description::BAD_ATTRIBUTE))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|_| StreamError::BadXml(description::BAD_ENCODING))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|_| StreamError::BadXml(description::BAD_ENTITY))?
                .into_owned();
            if key == "xmlns" {
                declarations.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push((prefix.to_string(), value));
            } else {
                attributes.push((key, value));
            }
        }

        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", qname.as_str()),
        };
        let namespace = self.resolve(prefix, &declarations, stack);
        if namespace.is_none() && !prefix.is_empty() {
            return Err(StreamError::BadXml(description::UNDECLARED_PREFIX));
        }
        let mut element = match namespace {
            Some(ns) => Element::new(local, ns),
            None => Element::bare(local),
        };
        // Prefixed attributes keep their prefix, so each element carries
        // the declarations they need when written out on its own.
        for (key, _) in &attributes {
            let Some((prefix, _)) = key.split_once(':') else {
                continue;
            };
            if prefix == "xml" {
                continue;
            }
            let declaration = format!("xmlns:{prefix}");
            if element.attribute(&declaration).is_some() {
                continue;
            }
            let ns = self
                .resolve(prefix, &declarations, stack)
                .ok_or(StreamError::BadXml(description::UNDECLARED_PREFIX))?;
            element.set_attribute(&declaration, ns);
        }
        for (key, value) in attributes {
            element.set_attribute(&key, &value);
        }
        Ok((element, declarations))
    }

    fn resolve<'a>(
        &'a self,
        prefix: &str,
        own: &'a Declarations,
        stack: &'a [(Element, Declarations)],
    ) -> Option<&'a str> {
        let scopes = std::iter::once(own)
            .chain(stack.iter().rev().map(|(_, declarations)| declarations))
            .chain(std::iter::once(&self.header_scope));
        for scope in scopes {
            if let Some((_, ns)) = scope.iter().find(|(p, _)| p == prefix) {
                return Some(ns);
            }
        }
        None
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

// Length of the markup at the start of `data`, if it is complete.
fn markup_len(data: &[u8]) -> Option<usize> {
    let terminator: &[u8] = if data.starts_with(b"<!--") {
        b"-->"
    } else if data.starts_with(b"<![CDATA[") {
        b"]]>"
    } else if data.starts_with(b"<?") {
        b"?>"
    } else {
        return tag_len(data);
    };
    data.windows(terminator.len())
        .position(|window| window == terminator)
        .map(|pos| pos + terminator.len())
}

fn tag_len(data: &[u8]) -> Option<usize> {
    let mut quote = None;
    for (pos, c) in data.iter().enumerate() {
        match (quote, *c) {
            (None, b'"' | b'\'') => quote = Some(*c),
            (Some(open), c) if open == c => quote = None,
            (None, b'>') => return Some(pos + 1),
            _ => (),
        }
    }
    None
}

fn tag_name(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .position(|c| c.is_ascii_whitespace() || *c == b'/' || *c == b'>')
        .unwrap_or(data.len());
    &data[..end]
}

fn is_stream_header(element: &Element) -> bool {
    element.is("stream", STREAM_NS)
}

/// Iterator over the complete elements available in a parser.
pub struct StreamElements<'a> {
    parser: &'a mut StreamParser,
}

impl Iterator for StreamElements<'_> {
    type Item = Result<StreamElement, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_element().transpose()
    }
}
