use crate::domain::batch::DocumentBatch;
use thiserror::Error;

/// Failures while deriving identity or payload from a document bag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Missing document type code (TipoDTE) in the document data")]
    MissingDocumentType,

    #[error("Missing field required to compute the document id: {0}")]
    MissingIdField(&'static str),

    #[error("Document type {0} is not a known SII document type")]
    UnknownDocumentType(u16),

    #[error("Document {0} has no normalized data to build its payload from")]
    MissingPayload(String),

    #[error("Invalid document options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// Envelope invariant violations. The envelope is left untouched when any of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Cannot modify the envelope once its cover sheet was generated")]
    Sealed,

    #[error("Document type {document} cannot be added to an envelope of type {envelope}")]
    TypeMismatch { document: String, envelope: String },

    #[error("Cannot add more documents to envelope {envelope}, the limit is {limit} documents per envelope")]
    CapacityExceeded { envelope: String, limit: usize },

    #[error("The envelope needs a {0} to build its cover sheet")]
    MissingParty(&'static str),

    #[error("The envelope has no documents")]
    Empty,

    #[error("The envelope payload can only be built after the cover sheet is set")]
    NotSealed,

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Taxpayer identifier (RUT) validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RutError {
    #[error("Malformed taxpayer id '{0}'")]
    Malformed(String),

    #[error("Check digit of taxpayer id '{0}' is invalid")]
    CheckDigit(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("XML write error: {0}")]
    Write(String),

    #[error("Character {0:?} cannot be encoded as ISO-8859-1")]
    Unencodable(char),

    #[error("Payload must be a single JSON object with one root element")]
    InvalidRoot,
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        XmlError::Parse(err.to_string())
    }
}

/// The error taxonomy of the upload protocol. `Preparation` covers local
/// failures before the first attempt (token, staging); `Transport` is only
/// reported once the retry budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    EnvelopeConstraint,
    Preparation,
    Transport,
    Protocol,
    RemoteRejection,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::EnvelopeConstraint => "envelope_constraint",
            ErrorKind::Preparation => "preparation",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::RemoteRejection => "remote_rejection",
        }
    }
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("The XML to be sent to the SII cannot be empty")]
    EmptyPayload,

    #[error("Invalid taxpayer id: {0}")]
    InvalidIdentifier(#[from] RutError),

    #[error("Invalid payload: {0}")]
    Payload(#[from] XmlError),

    #[error("Could not stage the upload artifact: {0}")]
    Artifact(#[from] std::io::Error),

    #[error("Could not obtain an authentication token: {0}")]
    Authentication(String),

    #[error("Upload to the SII failed: {message}")]
    Transport { message: String },

    #[error("{0}")]
    Protocol(String),

    #[error("{message}")]
    RemoteRejection {
        status: i64,
        message: String,
        details: Vec<String>,
    },
}

impl SubmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmissionError::EmptyPayload
            | SubmissionError::InvalidIdentifier(_)
            | SubmissionError::Payload(_) => ErrorKind::Validation,
            SubmissionError::Artifact(_) | SubmissionError::Authentication(_) => ErrorKind::Preparation,
            SubmissionError::Transport { .. } => ErrorKind::Transport,
            SubmissionError::Protocol(_) => ErrorKind::Protocol,
            SubmissionError::RemoteRejection { .. } => ErrorKind::RemoteRejection,
        }
    }

    /// Status code of a remote rejection, if this is one.
    pub fn status(&self) -> Option<i64> {
        match self {
            SubmissionError::RemoteRejection { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl EnvelopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnvelopeError::Document(_) | EnvelopeError::MissingParty(_) => ErrorKind::Validation,
            _ => ErrorKind::EnvelopeConstraint,
        }
    }
}

/// Failures turning a batch file into document bags. The batch travels with
/// the error so the caller can report or retry it.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("No batch processing strategy named '{strategy}'")]
    UnknownStrategy {
        strategy: String,
        batch: Box<DocumentBatch>,
    },

    #[error("{message}")]
    Processing {
        message: String,
        batch: Box<DocumentBatch>,
    },
}

impl BatchError {
    pub fn batch(&self) -> &DocumentBatch {
        match self {
            BatchError::UnknownStrategy { batch, .. } | BatchError::Processing { batch, .. } => batch.as_ref(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;
pub type EnvelopeResult<T> = std::result::Result<T, EnvelopeError>;
pub type BatchResult<T> = std::result::Result<T, BatchError>;
pub type SubmissionResult<T> = std::result::Result<T, SubmissionError>;
