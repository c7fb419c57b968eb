use crate::constants::{SCHEMA_VERSION, SII_NAMESPACE, UNKNOWN_DOCUMENT_ALIAS};
use crate::domain::document_type::DocumentType;
use crate::domain::options::DocumentOptions;
use crate::domain::parties::{Certificate, FolioAuthorization, Issuer, Recipient};
use crate::error::{DocumentError, DocumentResult};
use crate::xml::{XmlDocument, ATTRIBUTES_KEY};
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const TYPE_PATH: &[&str] = &["Encabezado", "IdDoc", "TipoDTE"];
const FOLIO_PATH: &[&str] = &["Encabezado", "IdDoc", "Folio"];
const ISSUER_PATH: &[&str] = &["Encabezado", "Emisor", "RUTEmisor"];
const TYPE_QUERY: &str = "//Encabezado/IdDoc/TipoDTE";

/// Raw document input as handed over by a parser's caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Text(String),
    Structured(Value),
}

impl From<&str> for RawInput {
    fn from(text: &str) -> Self {
        RawInput::Text(text.to_string())
    }
}

impl From<String> for RawInput {
    fn from(text: String) -> Self {
        RawInput::Text(text)
    }
}

impl From<Value> for RawInput {
    fn from(value: Value) -> Self {
        RawInput::Structured(value)
    }
}

/// A document already generated from this bag's data.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedDocument {
    pub code: u16,
    pub xml: XmlDocument,
}

/// Identifier of a document: `LibreDTE_{issuer}_T{type}F{folio}`.
pub fn document_id(issuer_id: &str, type_code: u16, folio: u64) -> String {
    format!("LibreDTE_{}_T{}F{}", issuer_id, type_code, folio)
}

/// Everything known about one tax document on its way to an envelope.
///
/// The payload is derived at most once per bag: after the first successful
/// [`DocumentBag::build_payload`] later setter calls do not change it. Use the
/// `with_*` methods to get a fresh bag instead of mutating a read one.
#[derive(Debug, Clone, Default)]
pub struct DocumentBag {
    input_data: Option<String>,
    parsed_data: Option<Value>,
    normalized_data: Option<Value>,
    options: DocumentOptions,
    xml_document: Option<XmlDocument>,
    folio_authorization: Option<Arc<FolioAuthorization>>,
    certificate: Option<Arc<Certificate>>,
    document: Option<Arc<IssuedDocument>>,
    document_type: Option<Arc<DocumentType>>,
    issuer: Option<Arc<Issuer>>,
    recipient: Option<Arc<Recipient>>,
    stamp: Option<Value>,
    payload: OnceCell<Value>,
}

impl DocumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bag for already normalized data, the common case for dispatching.
    pub fn from_normalized(normalized: Value) -> Self {
        Self {
            normalized_data: Some(normalized),
            ..Self::default()
        }
    }

    /// Stores the raw input. Structured values are kept as their JSON text;
    /// `None` clears the field.
    pub fn set_input_data(&mut self, raw: Option<RawInput>) -> &mut Self {
        self.input_data = raw.map(|raw| match raw {
            RawInput::Text(text) => text,
            RawInput::Structured(value) => value.to_string(),
        });
        self
    }

    pub fn input_data(&self) -> Option<&str> {
        self.input_data.as_deref()
    }

    pub fn set_parsed_data(&mut self, parsed: Option<Value>) -> &mut Self {
        self.parsed_data = parsed;
        self
    }

    pub fn parsed_data(&self) -> Option<&Value> {
        self.parsed_data.as_ref()
    }

    pub fn set_normalized_data(&mut self, normalized: Option<Value>) -> &mut Self {
        self.normalized_data = normalized;
        self
    }

    pub fn normalized_data(&self) -> Option<&Value> {
        self.normalized_data.as_ref()
    }

    pub fn set_options(&mut self, options: DocumentOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    pub fn set_xml_document(&mut self, xml: Option<XmlDocument>) -> &mut Self {
        self.xml_document = xml;
        self
    }

    pub fn xml_document(&self) -> Option<&XmlDocument> {
        self.xml_document.as_ref()
    }

    pub fn set_folio_authorization(&mut self, caf: Option<Arc<FolioAuthorization>>) -> &mut Self {
        self.folio_authorization = caf;
        self
    }

    pub fn folio_authorization(&self) -> Option<&Arc<FolioAuthorization>> {
        self.folio_authorization.as_ref()
    }

    pub fn set_certificate(&mut self, certificate: Option<Arc<Certificate>>) -> &mut Self {
        self.certificate = certificate;
        self
    }

    pub fn certificate(&self) -> Option<&Arc<Certificate>> {
        self.certificate.as_ref()
    }

    pub fn set_document(&mut self, document: Option<Arc<IssuedDocument>>) -> &mut Self {
        self.document = document;
        self
    }

    pub fn document(&self) -> Option<&Arc<IssuedDocument>> {
        self.document.as_ref()
    }

    pub fn set_document_type(&mut self, document_type: Option<Arc<DocumentType>>) -> &mut Self {
        self.document_type = document_type;
        self
    }

    pub fn set_issuer(&mut self, issuer: Option<Arc<Issuer>>) -> &mut Self {
        self.issuer = issuer;
        self
    }

    pub fn issuer(&self) -> Option<&Arc<Issuer>> {
        self.issuer.as_ref()
    }

    pub fn set_recipient(&mut self, recipient: Option<Arc<Recipient>>) -> &mut Self {
        self.recipient = recipient;
        self
    }

    pub fn recipient(&self) -> Option<&Arc<Recipient>> {
        self.recipient.as_ref()
    }

    /// Attaches the stamp block (`TED` and its timestamp), computed elsewhere.
    pub fn set_stamp(&mut self, stamp: Option<Value>) -> &mut Self {
        self.stamp = stamp;
        self
    }

    pub fn stamp(&self) -> Option<&Value> {
        self.stamp.as_ref()
    }

    /// Document type code, looked up in parsed data, normalized data, the
    /// attached XML and the issued document, in that order.
    pub fn resolve_document_type_id(&self) -> DocumentResult<u16> {
        let candidate = present(self.parsed_data.as_ref(), TYPE_PATH)
            .or_else(|| present(self.normalized_data.as_ref(), TYPE_PATH))
            .map(value_text)
            .or_else(|| self.xml_document.as_ref().and_then(|xml| xml.query(TYPE_QUERY)))
            .or_else(|| self.document.as_ref().map(|doc| doc.code.to_string()));

        candidate
            .and_then(|code| code.trim().parse::<u16>().ok())
            .filter(|code| *code != 0)
            .ok_or(DocumentError::MissingDocumentType)
    }

    /// The attached document type, or the catalog entry for the resolved code.
    pub fn document_type(&self) -> DocumentResult<DocumentType> {
        if let Some(document_type) = &self.document_type {
            return Ok(document_type.as_ref().clone());
        }
        let code = self.resolve_document_type_id()?;
        DocumentType::from_code(code).ok_or(DocumentError::UnknownDocumentType(code))
    }

    pub fn folio(&self) -> Option<u64> {
        present(self.normalized_data.as_ref(), FOLIO_PATH).and_then(as_integer)
    }

    pub fn compute_id(&self) -> DocumentResult<String> {
        let normalized = self.normalized_data.as_ref();
        let issuer = present(normalized, ISSUER_PATH)
            .map(value_text)
            .filter(|s| !s.is_empty())
            .ok_or(DocumentError::MissingIdField("Encabezado/Emisor/RUTEmisor"))?;
        let type_code = present(normalized, TYPE_PATH)
            .and_then(as_integer)
            .and_then(|code| u16::try_from(code).ok())
            .ok_or(DocumentError::MissingIdField("Encabezado/IdDoc/TipoDTE"))?;
        let folio = present(normalized, FOLIO_PATH)
            .and_then(as_integer)
            .ok_or(DocumentError::MissingIdField("Encabezado/IdDoc/Folio"))?;

        Ok(document_id(&issuer, type_code, folio))
    }

    /// The `<DTE>` payload tree. `Ok(None)` while there is no normalized data.
    pub fn build_payload(&self) -> DocumentResult<Option<&Value>> {
        if let Some(payload) = self.payload.get() {
            return Ok(Some(payload));
        }
        let normalized = match &self.normalized_data {
            Some(value) if !is_empty(value) => value,
            _ => return Ok(None),
        };
        let payload = self.payload.get_or_try_init(|| self.assemble_payload(normalized))?;
        Ok(Some(payload))
    }

    /// The payload rendered as XML, unsigned.
    pub fn to_xml(&self) -> DocumentResult<Option<XmlDocument>> {
        match self.build_payload()? {
            Some(payload) => Ok(Some(XmlDocument::from_value(payload)?)),
            None => Ok(None),
        }
    }

    fn assemble_payload(&self, normalized: &Value) -> DocumentResult<Value> {
        let tag = self.document_type()?.xml_tag.name();
        let id = self.compute_id()?;

        let mut body = Map::new();
        body.insert(ATTRIBUTES_KEY.to_string(), json!({ "ID": id }));
        if let Some(fields) = normalized.as_object() {
            body.extend(fields.clone());
        }
        if let Some(Value::Object(stamp)) = &self.stamp {
            body.extend(stamp.clone());
        }

        let mut dte = Map::new();
        dte.insert(
            ATTRIBUTES_KEY.to_string(),
            json!({ "version": SCHEMA_VERSION, "xmlns": SII_NAMESPACE }),
        );
        dte.insert(tag.to_string(), Value::Object(body));

        Ok(json!({ "DTE": Value::Object(dte) }))
    }

    /// Copy of this bag with another folio authorization.
    pub fn with_folio_authorization(&self, caf: Arc<FolioAuthorization>) -> Self {
        let mut bag = self.fresh_copy();
        bag.folio_authorization = Some(caf);
        bag
    }

    /// Copy of this bag with another certificate.
    pub fn with_certificate(&self, certificate: Arc<Certificate>) -> Self {
        let mut bag = self.fresh_copy();
        bag.certificate = Some(certificate);
        bag
    }

    fn fresh_copy(&self) -> Self {
        let mut bag = self.clone();
        bag.payload = OnceCell::new();
        bag
    }

    /// Short name used for files and logs.
    pub fn resolve_alias(&self) -> String {
        if let Some(document_type) = &self.document_type {
            if let Some(alias) = &document_type.alias {
                return alias.clone();
            }
            if document_type.code != 0 {
                return format!("documento_{}", document_type.code);
            }
        }
        present(self.parsed_data.as_ref(), TYPE_PATH)
            .map(value_text)
            .unwrap_or_else(|| UNKNOWN_DOCUMENT_ALIAS.to_string())
    }
}

fn present<'a>(data: Option<&'a Value>, path: &[&str]) -> Option<&'a Value> {
    let mut node = data?;
    for key in path {
        node = node.get(key)?;
    }
    (!node.is_null()).then_some(node)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
