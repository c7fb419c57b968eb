//! Minimal XML layer: payload trees are kept as JSON values and rendered to
//! XML at the edges, upload responses go the other way.

use crate::constants::XML_DECLARATION;
use crate::error::XmlError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};
use std::fmt;

/// Key holding an element's attributes in a JSON payload tree.
pub const ATTRIBUTES_KEY: &str = "@attributes";
/// Key holding the text of an element that also has attributes or children.
pub const TEXT_KEY: &str = "@value";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlDocument {
    xml: String,
}

impl XmlDocument {
    /// Wraps an XML string after checking it is well formed.
    pub fn parse(xml: impl Into<String>) -> Result<Self, XmlError> {
        let doc = Self { xml: xml.into() };
        doc.to_value()?;
        Ok(doc)
    }

    /// Renders a single-rooted payload tree (`{"Root": {...}}`).
    pub fn from_value(value: &Value) -> Result<Self, XmlError> {
        let map = value.as_object().ok_or(XmlError::InvalidRoot)?;
        if map.len() != 1 {
            return Err(XmlError::InvalidRoot);
        }

        let mut writer = Writer::new(Vec::new());
        for (name, node) in map {
            write_element(&mut writer, name, node)?;
        }
        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| XmlError::Write(e.to_string()))?;
        Ok(Self { xml })
    }

    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// True when there is nothing to send: blank, or only the declaration.
    pub fn is_blank(&self) -> bool {
        let trimmed = self.xml.trim();
        trimmed.is_empty() || trimmed == XML_DECLARATION
    }

    /// ISO-8859-1 bytes ready to be written to disk. Any declaration the
    /// document carries is replaced so the label matches the bytes.
    pub fn save_xml(&self) -> Result<Vec<u8>, XmlError> {
        encode_latin1(&format!("{}\n{}", XML_DECLARATION, self.body()))
    }

    /// The document without its leading `<?xml ...?>` declaration.
    fn body(&self) -> &str {
        let trimmed = self.xml.trim_start();
        let declared = trimmed
            .strip_prefix("<?xml")
            .filter(|rest| rest.starts_with(char::is_whitespace) || rest.starts_with("?>"));
        match declared.and_then(|rest| rest.find("?>").map(|end| &rest[end + 2..])) {
            Some(rest) => rest.trim_start(),
            None => &self.xml,
        }
    }

    /// Text of the first element whose ancestry ends with `path`
    /// (`//Encabezado/IdDoc/TipoDTE` style, namespace prefixes ignored).
    pub fn query(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return None;
        }

        let mut reader = Reader::from_str(&self.xml);
        reader.trim_text(true);
        let mut stack: Vec<String> = Vec::new();
        let mut capture: Option<(usize, String)> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(local_name(&e));
                    if capture.is_none() && ends_with(&stack, &segments) {
                        capture = Some((stack.len(), String::new()));
                    }
                }
                Ok(Event::Empty(e)) => {
                    stack.push(local_name(&e));
                    if capture.is_none() && ends_with(&stack, &segments) {
                        return Some(String::new());
                    }
                    stack.pop();
                }
                Ok(Event::Text(t)) => {
                    if let Some((depth, text)) = capture.as_mut() {
                        if *depth == stack.len() {
                            text.push_str(&t.unescape().ok()?);
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    if let Some((depth, text)) = capture.take() {
                        if depth == stack.len() {
                            return Some(text);
                        }
                        capture = Some((depth, text));
                    }
                    stack.pop();
                }
                Ok(Event::Eof) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Converts the document into a JSON tree keyed by element name. Repeated
    /// siblings become arrays; leaves become strings.
    pub fn to_value(&self) -> Result<Value, XmlError> {
        let mut reader = Reader::from_str(&self.xml);
        reader.trim_text(true);
        let mut stack: Vec<Frame> = vec![Frame::default()];

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Frame::open(&e)?),
                Event::Empty(e) => {
                    let (name, value) = Frame::open(&e)?.close();
                    if let Some(parent) = stack.last_mut() {
                        insert_child(&mut parent.children, name, value);
                    }
                }
                Event::Text(t) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(_) => {
                    if stack.len() < 2 {
                        return Err(XmlError::Parse("unbalanced closing tag".to_string()));
                    }
                    if let Some(frame) = stack.pop() {
                        let (name, value) = frame.close();
                        if let Some(parent) = stack.last_mut() {
                            insert_child(&mut parent.children, name, value);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() != 1 {
            return Err(XmlError::Parse("unclosed element at end of document".to_string()));
        }
        let root = stack.pop().unwrap_or_default();
        Ok(Value::Object(root.children))
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}

#[derive(Default)]
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(e: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut attributes = Map::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.insert(key, Value::String(value));
        }
        Ok(Self {
            name: local_name(e),
            attributes,
            ..Self::default()
        })
    }

    fn close(self) -> (String, Value) {
        if self.children.is_empty() && self.attributes.is_empty() {
            return (self.name, Value::String(self.text));
        }
        let mut map = Map::new();
        if !self.attributes.is_empty() {
            map.insert(ATTRIBUTES_KEY.to_string(), Value::Object(self.attributes));
        }
        if !self.text.is_empty() {
            map.insert(TEXT_KEY.to_string(), Value::String(self.text));
        }
        map.extend(self.children);
        (self.name, Value::Object(map))
    }
}

fn insert_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn ends_with(stack: &[String], segments: &[&str]) -> bool {
    stack.len() >= segments.len()
        && stack[stack.len() - segments.len()..]
            .iter()
            .zip(segments)
            .all(|(a, b)| a == b)
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), XmlError> {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            let mut start = BytesStart::new(name);
            if let Some(Value::Object(attrs)) = map.get(ATTRIBUTES_KEY) {
                for (key, attr) in attrs {
                    if let Some(text) = scalar_text(attr) {
                        start.push_attribute((key.as_str(), text.as_str()));
                    }
                }
            }
            writer.write_event(Event::Start(start)).map_err(write_error)?;
            if let Some(text) = map.get(TEXT_KEY).and_then(scalar_text) {
                writer
                    .write_event(Event::Text(BytesText::new(&text)))
                    .map_err(write_error)?;
            }
            for (key, child) in map {
                if key == ATTRIBUTES_KEY || key == TEXT_KEY {
                    continue;
                }
                write_element(writer, key, child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(write_error)
        }
        scalar => {
            let text = scalar_text(scalar).unwrap_or_default();
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(write_error)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(write_error)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(write_error)
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn write_error(err: quick_xml::Error) -> XmlError {
    XmlError::Write(err.to_string())
}

pub fn encode_latin1(text: &str) -> Result<Vec<u8>, XmlError> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| XmlError::Unencodable(c)))
        .collect()
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_attributes_arrays_and_skips_nulls() {
        let value = json!({
            "SetDTE": {
                "@attributes": { "ID": "LibreDTE_SetDoc" },
                "DTE": [ { "Folio": 1 }, { "Folio": 2 } ],
                "Nada": null,
                "Glosa": "a & b"
            }
        });
        let doc = XmlDocument::from_value(&value).unwrap();
        assert_eq!(
            doc.as_str(),
            "<SetDTE ID=\"LibreDTE_SetDoc\"><DTE><Folio>1</Folio></DTE><DTE><Folio>2</Folio></DTE><Glosa>a &amp; b</Glosa></SetDTE>"
        );
    }

    #[test]
    fn rejects_multi_root_values() {
        let value = json!({ "A": 1, "B": 2 });
        assert_eq!(XmlDocument::from_value(&value), Err(XmlError::InvalidRoot));
    }

    #[test]
    fn queries_by_path_suffix() {
        let doc = XmlDocument::parse(
            "<DTE><Documento><Encabezado><IdDoc><TipoDTE>33</TipoDTE><Folio>7</Folio></IdDoc></Encabezado></Documento></DTE>",
        )
        .unwrap();
        assert_eq!(doc.query("//Encabezado/IdDoc/TipoDTE").as_deref(), Some("33"));
        assert_eq!(doc.query("//IdDoc/Folio").as_deref(), Some("7"));
        assert_eq!(doc.query("//IdDoc/Missing"), None);
    }

    #[test]
    fn converts_responses_into_value_trees() {
        let doc = XmlDocument::parse(
            "<?xml version=\"1.0\"?>\n<RECEPCIONDTE><STATUS>7</STATUS></RECEPCIONDTE><DETAIL><ERROR>uno</ERROR><ERROR>dos</ERROR></DETAIL>",
        )
        .unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value["RECEPCIONDTE"]["STATUS"], json!("7"));
        assert_eq!(value["DETAIL"]["ERROR"], json!(["uno", "dos"]));
    }

    #[test]
    fn save_adds_declaration_and_encodes_latin1() {
        let doc = XmlDocument::parse("<Glosa>Año</Glosa>").unwrap();
        let bytes = doc.save_xml().unwrap();
        let expected_prefix = format!("{}\n<Glosa>A", XML_DECLARATION);
        assert!(bytes.starts_with(expected_prefix.as_bytes()));
        assert!(bytes.contains(&0xF1));
        assert!(decode_latin1(&bytes).ends_with("Año</Glosa>"));
    }

    #[test]
    fn save_relabels_foreign_declarations_as_latin1() {
        let doc = XmlDocument::parse("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Glosa>Año</Glosa>").unwrap();
        let bytes = doc.save_xml().unwrap();
        let mut expected = format!("{}\n<Glosa>A", XML_DECLARATION).into_bytes();
        expected.extend_from_slice(b"\xF1o</Glosa>");
        assert_eq!(bytes, expected);

        let latin1 = XmlDocument::parse(format!("{}\n<A>1</A>", XML_DECLARATION)).unwrap();
        assert_eq!(latin1.save_xml().unwrap(), format!("{}\n<A>1</A>", XML_DECLARATION).into_bytes());
    }

    #[test]
    fn save_rejects_characters_outside_latin1() {
        let doc = XmlDocument::parse("<Glosa>€</Glosa>").unwrap();
        assert_eq!(doc.save_xml(), Err(XmlError::Unencodable('€')));
    }

    #[test]
    fn blank_documents_are_detected() {
        assert!(XmlDocument::default().is_blank());
        assert!(XmlDocument::parse(format!("{}\n", XML_DECLARATION)).unwrap().is_blank());
        assert!(!XmlDocument::parse("<A/>").unwrap().is_blank());
    }
}
