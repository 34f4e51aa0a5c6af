/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::entities::escape;
use super::entities::escape_fmt;
use super::entities::escaped_size;

/// A namespaced XML element tree.
///
/// Stanzas and stream level signals are exchanged as elements. Each element
/// owns its attributes, character data and child elements, so a subtree can
/// be moved between stanzas but never shared.
///
/// Namespaces are always resolved: an element inserted under a parent
/// without an explicit namespace inherits the parent's namespace, which is
/// also what the stream parser produces for unprefixed children.
///
/// # Examples
///
/// ```
/// use iks_xmpp::Element;
///
/// let query = Element::new("query", "jabber:iq:version")
///     .with_child(Element::new("name", "jabber:iq:version").with_text("iksjab"));
/// assert_eq!(
///     query.to_string(),
///     "<query xmlns=\"jabber:iq:version\"><name>iksjab</name></query>"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Creates an element with the given local name and namespace.
    pub fn new(name: &str, namespace: &str) -> Element {
        Element {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }

    /// Creates an element which takes its namespace from the parent.
    pub fn bare(name: &str) -> Element {
        Element {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// True if the element has the given local name and namespace.
    pub fn is(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    //
    // Attributes
    //

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Sets an attribute, replacing the value if it already exists.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, old)) => *old = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(pos).1)
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Element {
        self.set_attribute(name, value);
        self
    }

    /// Sets the attribute only when a value is given.
    pub fn with_optional_attribute(mut self, name: &str, value: Option<&str>) -> Element {
        if let Some(value) = value {
            self.set_attribute(name, value);
        }
        self
    }

    //
    // Character data
    //

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }

    pub fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn with_text(mut self, text: &str) -> Element {
        self.set_text(text);
        self
    }

    //
    // Children
    //

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    /// Appends a child and returns a reference to the inserted element.
    pub fn push_child(&mut self, mut child: Element) -> &mut Element {
        if let Some(ns) = &self.namespace {
            child.inherit_namespace(ns);
        }
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn with_child(mut self, child: Element) -> Element {
        self.push_child(child);
        self
    }

    pub fn take_children(&mut self) -> Vec<Element> {
        std::mem::take(&mut self.children)
    }

    pub fn find_child(&self, name: &str, namespace: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.is(name, namespace))
    }

    pub fn find_child_mut(&mut self, name: &str, namespace: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .find(|child| child.is(name, namespace))
    }

    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |child| child.is(name, namespace))
    }

    /// Character data of the first matching child element.
    pub fn child_text(&self, name: &str, namespace: &str) -> Option<&str> {
        self.find_child(name, namespace).map(|child| child.text())
    }

    pub(crate) fn inherit_namespace(&mut self, namespace: &str) {
        if self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
        }
        let own = self.namespace.clone();
        if let Some(own) = own {
            for child in self.children.iter_mut() {
                child.inherit_namespace(&own);
            }
        }
    }

    //
    // Serialization
    //

    fn declares_namespace<'a>(&'a self, parent_ns: Option<&str>) -> Option<&'a str> {
        match &self.namespace {
            Some(ns) if parent_ns != Some(ns.as_str()) => Some(ns),
            _ => None,
        }
    }

    fn has_content(&self) -> bool {
        !self.text.is_empty() || !self.children.is_empty()
    }

    fn size_within(&self, parent_ns: Option<&str>) -> usize {
        let mut size = 1 + self.name.len(); // '<' name
        if let Some(ns) = self.declares_namespace(parent_ns) {
            size += " xmlns=\"".len() + escaped_size(ns) + 1;
        }
        for (key, value) in &self.attributes {
            size += 1 + key.len() + 2 + escaped_size(value) + 1;
        }
        if self.has_content() {
            size += 1; // '>'
            size += escaped_size(&self.text);
            for child in &self.children {
                size += child.size_within(self.namespace());
            }
            size += 2 + self.name.len() + 1; // '</' name '>'
        } else {
            size += 2; // Standalone tag closing '/>'
        }
        size
    }

    fn write_within(&self, buf: &mut String, parent_ns: Option<&str>) {
        buf.push('<');
        buf.push_str(&self.name);
        if let Some(ns) = self.declares_namespace(parent_ns) {
            buf.push_str(" xmlns=\"");
            escape(ns, buf);
            buf.push('"');
        }
        for (key, value) in &self.attributes {
            buf.push(' ');
            buf.push_str(key);
            buf.push_str("=\"");
            escape(value, buf);
            buf.push('"');
        }
        if !self.has_content() {
            buf.push_str("/>");
            return;
        }
        buf.push('>');
        escape(&self.text, buf);
        for child in &self.children {
            child.write_within(buf, self.namespace());
        }
        buf.push_str("</");
        buf.push_str(&self.name);
        buf.push('>');
    }

    fn fmt_within(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        parent_ns: Option<&str>,
    ) -> std::fmt::Result {
        f.write_str("<")?;
        f.write_str(&self.name)?;
        if let Some(ns) = self.declares_namespace(parent_ns) {
            f.write_str(" xmlns=\"")?;
            escape_fmt(ns, f)?;
            f.write_str("\"")?;
        }
        for (key, value) in &self.attributes {
            f.write_str(" ")?;
            f.write_str(key)?;
            f.write_str("=\"")?;
            escape_fmt(value, f)?;
            f.write_str("\"")?;
        }
        if !self.has_content() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        escape_fmt(&self.text, f)?;
        for child in &self.children {
            child.fmt_within(f, self.namespace())?;
        }
        f.write_str("</")?;
        f.write_str(&self.name)?;
        f.write_str(">")
    }

    /// Serializes the element as it would appear inside a stream whose
    /// default namespace is `stream_ns`, omitting a redundant `xmlns`.
    pub fn to_stream_string(&self, stream_ns: &str) -> String {
        let mut buf = String::with_capacity(self.size_within(Some(stream_ns)));
        self.write_within(&mut buf, Some(stream_ns));
        buf
    }

    pub fn str_size(&self) -> usize {
        self.size_within(None)
    }

    #[allow(
        clippy::inherent_to_string_shadow_display,
        reason = "prereserving exact capacity makes this function significantly faster"
    )]
    pub fn to_string(&self) -> String {
        let mut buf = String::with_capacity(self.str_size());
        self.write_within(&mut buf, None);
        buf
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_within(f, None)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        if self.name != other.name
            || self.namespace != other.namespace
            || self.text != other.text
            || self.attributes.len() != other.attributes.len()
            || self.children != other.children
        {
            return false;
        }
        self.attributes
            .iter()
            .all(|(key, value)| other.attribute(key) == Some(value.as_str()))
    }
}

impl Eq for Element {}
