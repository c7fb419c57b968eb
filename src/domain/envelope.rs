use crate::constants::{ENVELOPE_SET_ID, SCHEMA_VERSION, SII_NAMESPACE, SII_TAXPAYER_ID};
use crate::domain::bag::DocumentBag;
use crate::domain::document_type::EnvelopeType;
use crate::domain::options::EnvelopeOptions;
use crate::domain::parties::{Certificate, Issuer, Mandatary, Recipient};
use crate::error::{DocumentError, EnvelopeError, EnvelopeResult};
use crate::xml::{XmlDocument, ATTRIBUTES_KEY};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How many documents an envelope of a given type may hold.
pub trait CapacityPolicy: Send + Sync + fmt::Debug {
    fn max_documents(&self, envelope_type: EnvelopeType) -> usize;
}

/// The SII quotas: 2000 per `EnvioDTE`, 1000 per `EnvioBOLETA`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiiCapacityPolicy;

impl CapacityPolicy for SiiCapacityPolicy {
    fn max_documents(&self, envelope_type: EnvelopeType) -> usize {
        envelope_type.default_capacity()
    }
}

/// Same quota for every envelope type.
#[derive(Debug, Clone, Copy)]
pub struct UniformCapacity(pub usize);

impl CapacityPolicy for UniformCapacity {
    fn max_documents(&self, _envelope_type: EnvelopeType) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Empty,
    Accumulating,
    Sealed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtotal {
    pub document_type: u16,
    pub count: usize,
}

/// Cover sheet (`Caratula`) summarizing an envelope. Setting it seals the
/// envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverSheet {
    pub issuer_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub resolution_date: NaiveDate,
    pub resolution_number: u32,
    pub signed_at: NaiveDateTime,
    pub subtotals: Vec<Subtotal>,
}

impl CoverSheet {
    /// Derives the cover sheet from the envelope's parties and documents.
    /// The issuer falls back to the first document's issuer and the recipient
    /// to the SII itself.
    pub fn for_envelope(envelope: &DocumentEnvelope, signed_at: NaiveDateTime) -> EnvelopeResult<Self> {
        let first = envelope.documents.first().ok_or(EnvelopeError::Empty)?;

        let issuer = envelope
            .issuer
            .as_ref()
            .or_else(|| first.issuer())
            .ok_or(EnvelopeError::MissingParty("issuer"))?;
        let authorization = issuer
            .authorization
            .as_ref()
            .ok_or(EnvelopeError::MissingParty("issuer authorization"))?;
        let certificate = envelope
            .certificate
            .as_ref()
            .ok_or(EnvelopeError::MissingParty("certificate"))?;
        let recipient_id = envelope
            .recipient
            .as_ref()
            .map(|r| r.rut.to_string())
            .unwrap_or_else(|| SII_TAXPAYER_ID.to_string());

        let mut subtotals: Vec<Subtotal> = Vec::new();
        for bag in &envelope.documents {
            let code = bag.resolve_document_type_id()?;
            match subtotals.iter_mut().find(|s| s.document_type == code) {
                Some(subtotal) => subtotal.count += 1,
                None => subtotals.push(Subtotal {
                    document_type: code,
                    count: 1,
                }),
            }
        }

        Ok(Self {
            issuer_id: issuer.rut.to_string(),
            sender_id: certificate.id.clone(),
            recipient_id,
            resolution_date: authorization.resolution_date,
            resolution_number: authorization.resolution_number,
            signed_at,
            subtotals,
        })
    }

    pub fn to_value(&self) -> Value {
        let subtotals: Vec<Value> = self
            .subtotals
            .iter()
            .map(|s| json!({ "TpoDTE": s.document_type, "NroDTE": s.count }))
            .collect();
        json!({
            "@attributes": { "version": SCHEMA_VERSION },
            "RutEmisor": self.issuer_id,
            "RutEnvia": self.sender_id,
            "RutReceptor": self.recipient_id,
            "FchResol": self.resolution_date.format("%Y-%m-%d").to_string(),
            "NroResol": self.resolution_number,
            "TmstFirmaEnv": self.signed_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "SubTotDTE": subtotals,
        })
    }
}

/// A dispatch batch of documents that share one envelope type.
///
/// `Empty -> Accumulating -> Sealed`. The first document fixes the envelope
/// type; setting the cover sheet seals it. Bags are shared, not owned.
/// Mutation needs `&mut self`: share an envelope across tasks behind a mutex.
#[derive(Debug, Clone)]
pub struct DocumentEnvelope {
    envelope_type: Option<EnvelopeType>,
    documents: Vec<Arc<DocumentBag>>,
    options: EnvelopeOptions,
    issuer: Option<Arc<Issuer>>,
    mandatary: Option<Arc<Mandatary>>,
    recipient: Option<Arc<Recipient>>,
    certificate: Option<Arc<Certificate>>,
    cover_sheet: Option<CoverSheet>,
    xml_document: Option<XmlDocument>,
    policy: Arc<dyn CapacityPolicy>,
}

impl Default for DocumentEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentEnvelope {
    pub fn new() -> Self {
        Self::with_policy(Arc::new(SiiCapacityPolicy))
    }

    pub fn with_policy(policy: Arc<dyn CapacityPolicy>) -> Self {
        Self {
            envelope_type: None,
            documents: Vec::new(),
            options: EnvelopeOptions::default(),
            issuer: None,
            mandatary: None,
            recipient: None,
            certificate: None,
            cover_sheet: None,
            xml_document: None,
            policy,
        }
    }

    /// Id of the `SetDTE` node.
    pub fn id(&self) -> &'static str {
        ENVELOPE_SET_ID
    }

    pub fn state(&self) -> EnvelopeState {
        if self.cover_sheet.is_some() {
            EnvelopeState::Sealed
        } else if self.documents.is_empty() {
            EnvelopeState::Empty
        } else {
            EnvelopeState::Accumulating
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.cover_sheet.is_some()
    }

    pub fn envelope_type(&self) -> Option<EnvelopeType> {
        self.envelope_type
    }

    pub fn documents(&self) -> &[Arc<DocumentBag>] {
        &self.documents
    }

    /// Quota for this envelope, known once its type is fixed.
    pub fn capacity(&self) -> Option<usize> {
        self.envelope_type.map(|t| self.policy.max_documents(t))
    }

    pub fn add_document(&mut self, bag: Arc<DocumentBag>) -> EnvelopeResult<&mut Self> {
        self.ensure_mutable()?;

        let document_type = bag.document_type()?;
        let envelope_type = self.envelope_type.unwrap_or(document_type.envelope_type);

        if document_type.envelope_type != envelope_type {
            debug!(
                document_type = document_type.code,
                envelope = %envelope_type,
                "Rejected document of a different envelope type"
            );
            return Err(EnvelopeError::TypeMismatch {
                document: document_type.name,
                envelope: envelope_type.to_string(),
            });
        }

        let limit = self.policy.max_documents(envelope_type);
        if self.documents.len() >= limit {
            debug!(envelope = %envelope_type, limit, "Rejected document over envelope capacity");
            return Err(EnvelopeError::CapacityExceeded {
                envelope: envelope_type.to_string(),
                limit,
            });
        }

        if self.envelope_type.is_none() {
            debug!(envelope = %envelope_type, "Envelope type fixed by first document");
            self.envelope_type = Some(envelope_type);
        }
        self.documents.push(bag);
        Ok(self)
    }

    /// Adds every bag or none of them.
    pub fn add_documents<I>(&mut self, bags: I) -> EnvelopeResult<&mut Self>
    where
        I: IntoIterator<Item = Arc<DocumentBag>>,
    {
        let mut staged = self.clone();
        for bag in bags {
            staged.add_document(bag)?;
        }
        *self = staged;
        Ok(self)
    }

    /// Stores the cover sheet and seals the envelope.
    pub fn set_cover_sheet(&mut self, cover_sheet: CoverSheet) -> EnvelopeResult<&mut Self> {
        self.ensure_mutable()?;
        debug!(documents = self.documents.len(), "Envelope sealed");
        self.cover_sheet = Some(cover_sheet);
        Ok(self)
    }

    pub fn cover_sheet(&self) -> Option<&CoverSheet> {
        self.cover_sheet.as_ref()
    }

    pub fn set_options(&mut self, options: EnvelopeOptions) -> EnvelopeResult<&mut Self> {
        self.ensure_mutable()?;
        self.options = options;
        Ok(self)
    }

    pub fn options(&self) -> &EnvelopeOptions {
        &self.options
    }

    pub fn set_issuer(&mut self, issuer: Option<Arc<Issuer>>) -> EnvelopeResult<&mut Self> {
        self.ensure_mutable()?;
        self.issuer = issuer;
        Ok(self)
    }

    pub fn issuer(&self) -> Option<&Arc<Issuer>> {
        self.issuer.as_ref()
    }

    pub fn set_mandatary(&mut self, mandatary: Option<Arc<Mandatary>>) -> EnvelopeResult<&mut Self> {
        self.ensure_mutable()?;
        self.mandatary = mandatary;
        Ok(self)
    }

    pub fn mandatary(&self) -> Option<&Arc<Mandatary>> {
        self.mandatary.as_ref()
    }

    pub fn set_recipient(&mut self, recipient: Option<Arc<Recipient>>) -> EnvelopeResult<&mut Self> {
        self.ensure_mutable()?;
        self.recipient = recipient;
        Ok(self)
    }

    pub fn recipient(&self) -> Option<&Arc<Recipient>> {
        self.recipient.as_ref()
    }

    pub fn set_certificate(&mut self, certificate: Option<Arc<Certificate>>) -> EnvelopeResult<&mut Self> {
        self.ensure_mutable()?;
        self.certificate = certificate;
        Ok(self)
    }

    pub fn certificate(&self) -> Option<&Arc<Certificate>> {
        self.certificate.as_ref()
    }

    /// Slot for the rendered (and later signed) XML. Not part of the sealed
    /// content, so it stays writable.
    pub fn set_xml_document(&mut self, xml: Option<XmlDocument>) -> &mut Self {
        self.xml_document = xml;
        self
    }

    pub fn xml_document(&self) -> Option<&XmlDocument> {
        self.xml_document.as_ref()
    }

    /// New unsealed envelope with the same documents, options and parties,
    /// signed by another certificate. The cover sheet names the sender, so it
    /// is not carried over.
    pub fn with_certificate(&self, certificate: Arc<Certificate>) -> Self {
        Self {
            envelope_type: self.envelope_type,
            documents: self.documents.clone(),
            options: self.options.clone(),
            issuer: self.issuer.clone(),
            mandatary: self.mandatary.clone(),
            recipient: self.recipient.clone(),
            certificate: Some(certificate),
            cover_sheet: None,
            xml_document: None,
            policy: Arc::clone(&self.policy),
        }
    }

    /// `<EnvioDTE>` / `<EnvioBOLETA>` tree for a sealed envelope.
    pub fn build_payload(&self) -> EnvelopeResult<Value> {
        let cover_sheet = self.cover_sheet.as_ref().ok_or(EnvelopeError::NotSealed)?;
        let envelope_type = self.envelope_type.ok_or(EnvelopeError::Empty)?;

        let mut dtes = Vec::with_capacity(self.documents.len());
        for bag in &self.documents {
            let payload = bag
                .build_payload()?
                .ok_or_else(|| DocumentError::MissingPayload(bag.resolve_alias()))?;
            dtes.push(payload["DTE"].clone());
        }

        let mut set = Map::new();
        set.insert(ATTRIBUTES_KEY.to_string(), json!({ "ID": ENVELOPE_SET_ID }));
        set.insert("Caratula".to_string(), cover_sheet.to_value());
        set.insert("DTE".to_string(), Value::Array(dtes));

        let mut root = Map::new();
        root.insert(
            ATTRIBUTES_KEY.to_string(),
            json!({ "xmlns": SII_NAMESPACE, "version": SCHEMA_VERSION }),
        );
        root.insert("SetDTE".to_string(), Value::Object(set));

        let mut envelope = Map::new();
        envelope.insert(envelope_type.root_tag().to_string(), Value::Object(root));
        Ok(Value::Object(envelope))
    }

    pub fn to_xml(&self) -> EnvelopeResult<XmlDocument> {
        let payload = self.build_payload()?;
        XmlDocument::from_value(&payload).map_err(|e| EnvelopeError::Document(e.into()))
    }

    fn ensure_mutable(&self) -> EnvelopeResult<()> {
        if self.is_sealed() {
            return Err(EnvelopeError::Sealed);
        }
        Ok(())
    }
}
