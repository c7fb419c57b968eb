pub mod bag;
pub mod batch;
pub mod document_type;
pub mod envelope;
pub mod options;
pub mod parties;

pub use bag::{document_id, DocumentBag, IssuedDocument, RawInput};
pub use batch::{BatchOptions, BatchProcessorOptions, DocumentBatch, DEFAULT_BATCH_STRATEGY};
pub use document_type::{DocumentType, EnvelopeType, XmlTag};
pub use envelope::{
    CapacityPolicy, CoverSheet, DocumentEnvelope, EnvelopeState, SiiCapacityPolicy, Subtotal,
    UniformCapacity,
};
pub use options::{DocumentOptions, EnvelopeOptions};
pub use parties::{Certificate, FolioAuthorization, Issuer, IssuerAuthorization, Mandatary, Recipient};
