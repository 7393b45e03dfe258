//! Minimal XML reader for XML-RPC envelopes.
//!
//! Handles what method responses actually contain: an optional prolog,
//! nested elements, attributes (parsed and ignored), self-closing tags,
//! character and predefined entities, comments, and CDATA sections.
//! Document type declarations are refused, and so is nesting deeper than
//! [`MAX_DEPTH`] elements.

use std::fmt;

/// A parsed element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub children: Vec<Node>,
}

/// Element content.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// First child element of any name.
    pub fn first_element(&self) -> Option<&Element> {
        self.elements().next()
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// Malformed input, with the byte offset where reading stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for XmlError {}

/// Deepest element nesting accepted. Real method responses stay well
/// under 50.
pub const MAX_DEPTH: usize = 256;

/// Parses a whole document and returns its root element.
pub fn parse_document(input: &str) -> Result<Element, XmlError> {
    let mut reader = Reader {
        src: input,
        pos: 0,
        depth: 0,
    };

    reader.skip_misc()?;
    if reader.rest().is_empty() {
        return Err(reader.error("document has no root element"));
    }
    let root = reader.element()?;
    reader.skip_misc()?;

    if !reader.rest().is_empty() {
        return Err(reader.error("content after root element"));
    }
    Ok(root)
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
    /// Elements currently open.
    depth: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: &str) -> XmlError {
        XmlError {
            message: message.to_string(),
            offset: self.pos,
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Advances past `terminator`, failing if it never appears.
    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<&'a str, XmlError> {
        match self.rest().find(terminator) {
            Some(idx) => {
                let body = &self.rest()[..idx];
                self.pos += idx + terminator.len();
                Ok(body)
            }
            None => Err(self.error(&format!("unterminated {what}"))),
        }
    }

    /// Skips whitespace, comments and processing instructions.
    fn skip_misc(&mut self) -> Result<(), XmlError> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<!DOCTYPE") || rest.starts_with("<!doctype") {
                return Err(self.error("document type declarations are not accepted"));
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<String, XmlError> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>' || c == '=')
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn expect(&mut self, token: &str) -> Result<(), XmlError> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{token}'")))
        }
    }

    fn element(&mut self) -> Result<Element, XmlError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("document nested too deeply"));
        }
        self.depth += 1;
        let element = self.element_body();
        self.depth -= 1;
        element
    }

    fn element_body(&mut self) -> Result<Element, XmlError> {
        self.expect("<")?;
        let name = self.name()?;

        // Attributes are read for well-formedness and dropped.
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(Element {
                    name,
                    children: Vec::new(),
                });
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.is_empty() {
                return Err(self.error("unterminated start tag"));
            }
            self.name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let quote = if self.rest().starts_with('"') {
                "\""
            } else if self.rest().starts_with('\'') {
                "'"
            } else {
                return Err(self.error("expected quoted attribute value"));
            };
            self.pos += 1;
            self.skip_past(quote, "attribute value")?;
        }

        let mut children = Vec::new();
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(&format!("unclosed element <{name}>")));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != name {
                    return Err(self.error(&format!(
                        "mismatched closing tag </{closing}> for <{name}>"
                    )));
                }
                self.skip_whitespace();
                self.expect(">")?;
                return Ok(Element { name, children });
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let text = self.skip_past("]]>", "CDATA section")?;
                push_text(&mut children, text.to_string());
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with('<') {
                children.push(Node::Element(self.element()?));
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let raw = &rest[..end];
                let start = self.pos;
                self.pos += end;
                let text = decode_entities(raw).map_err(|message| XmlError {
                    message,
                    offset: start,
                })?;
                push_text(&mut children, text);
            }
        }
    }
}

/// Appends text, merging with a preceding text node.
fn push_text(children: &mut Vec<Node>, text: String) {
    if let Some(Node::Text(prev)) = children.last_mut() {
        prev.push_str(&text);
    } else {
        children.push(Node::Text(text));
    }
}

/// Expands predefined and numeric character references.
pub fn decode_entities(raw: &str) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &after[..semi];

        let ch = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity '&{entity};'"))?
            }
        };
        out.push(ch);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Escapes text for element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
