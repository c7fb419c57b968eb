//! Wire and schema constants shared by the document, envelope and upload layers.
//! The upload values are fixed by the SII upload service and must not drift.

// Document and envelope schema
pub const SII_NAMESPACE: &str = "http://www.sii.cl/SiiDte";
pub const SCHEMA_VERSION: &str = "1.0";
pub const ENVELOPE_SET_ID: &str = "LibreDTE_SetDoc";
pub const UNKNOWN_DOCUMENT_ALIAS: &str = "documento_desconocido";

/// Recipient of every envelope sent to the SII itself.
pub const SII_TAXPAYER_ID: &str = "60803000-K";

// Serialization
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>";

// Upload endpoint
pub const PRODUCTION_BASE_URL: &str = "https://palena.sii.cl";
pub const CERTIFICATION_BASE_URL: &str = "https://maullin.sii.cl";
pub const UPLOAD_PATH: &str = "/cgi_dte/UPL/DTEUpload";
pub const USER_AGENT: &str = "Mozilla/4.0 (compatible; PROG 1.0; LibreDTE)";
pub const REFERER: &str = "https://www.libredte.cl";

// Multipart field names
pub const FIELD_RUT_SENDER: &str = "rutSender";
pub const FIELD_DV_SENDER: &str = "dvSender";
pub const FIELD_RUT_COMPANY: &str = "rutCompany";
pub const FIELD_DV_COMPANY: &str = "dvCompany";
pub const FIELD_FILE: &str = "archivo";

pub const MIME_XML: &str = "application/xml";
pub const MIME_GZIP: &str = "application/gzip";

/// Prefix of the temporary artifact holding the payload during an upload.
pub const ARTIFACT_PREFIX: &str = "libredte_xml_document_for_upload_to_sii_";

// Retry protocol
pub const MAX_RETRIES: u32 = 10;
pub const RETRY_BACKOFF_MS: u64 = 200;

/// Body the upload service answers with when it hits an internal fault.
pub const INTERNAL_FAULT_SENTINEL: &str = "Error 500";
