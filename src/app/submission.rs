use crate::app::ports::{
    CompressorPort, TemporaryStoragePort, TokenManagerPort, UploadArtifact, UploadFile, UploadRequest,
    UploadTransportPort,
};
use crate::app::response::{self, TrackId};
use crate::config::ConnectionConfig;
use crate::constants::{INTERNAL_FAULT_SENTINEL, MIME_GZIP, MIME_XML, RETRY_BACKOFF_MS, UPLOAD_PATH};
use crate::domain::parties::Certificate;
use crate::error::{SubmissionError, SubmissionResult};
use crate::infra::gzip::GzipCompressor;
use crate::infra::temp_storage::SystemTempStorage;
use crate::metrics::{SubmissionMetrics, TransientReason};
use crate::rut::TaxpayerId;
use crate::xml::XmlDocument;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Uploads finished payloads to the SII `DTEUpload` service on behalf of one
/// certificate holder.
///
/// `submit` is cancel-safe: dropping its future, e.g. through
/// `tokio::time::timeout`, stops the retry loop at the next await point and
/// still deletes the staged artifact.
pub struct SubmissionClient {
    certificate: Arc<Certificate>,
    config: ConnectionConfig,
    token_manager: Arc<dyn TokenManagerPort>,
    transport: Arc<dyn UploadTransportPort>,
    compressor: Arc<dyn CompressorPort>,
    storage: Arc<dyn TemporaryStoragePort>,
}

/// Why the last attempt of an exhausted retry loop failed.
enum AttemptFailure {
    Transport(String),
    Empty,
    InternalFault,
}

impl AttemptFailure {
    fn reason(&self) -> TransientReason {
        match self {
            AttemptFailure::Transport(_) => TransientReason::Transport,
            AttemptFailure::Empty => TransientReason::EmptyResponse,
            AttemptFailure::InternalFault => TransientReason::InternalFault,
        }
    }

    fn into_error(self) -> SubmissionError {
        let message = match self {
            AttemptFailure::Transport(message) => message,
            AttemptFailure::Empty => "The SII returned an empty response to the upload.".to_string(),
            AttemptFailure::InternalFault => "The SII servers are having problems (Error 500).".to_string(),
        };
        SubmissionError::Transport { message }
    }
}

impl SubmissionClient {
    /// Client with gzip compression and artifacts in the system temp dir.
    pub fn new(
        certificate: Arc<Certificate>,
        config: ConnectionConfig,
        token_manager: Arc<dyn TokenManagerPort>,
        transport: Arc<dyn UploadTransportPort>,
    ) -> Self {
        Self {
            certificate,
            config,
            token_manager,
            transport,
            compressor: Arc::new(GzipCompressor),
            storage: Arc::new(SystemTempStorage::default()),
        }
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn CompressorPort>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn TemporaryStoragePort>) -> Self {
        self.storage = storage;
        self
    }

    pub fn certificate(&self) -> &Arc<Certificate> {
        &self.certificate
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Uploads `document` for `company` and returns the SII tracking id.
    ///
    /// `retries` defaults to the configured budget and is clamped into
    /// `[0, MAX_RETRIES]`. When `compress` is set and compression fails, the
    /// plain XML is sent instead.
    pub async fn submit(
        &self,
        document: &XmlDocument,
        company: &str,
        compress: bool,
        retries: Option<u32>,
    ) -> SubmissionResult<TrackId> {
        let outcome = self.send(document, company, compress, retries).await;
        match &outcome {
            Ok(track_id) => {
                info!(company, track_id = track_id.value(), "Upload accepted by the SII");
                SubmissionMetrics::record_outcome("accepted");
            }
            Err(e) => {
                warn!(company, kind = e.kind().as_str(), error = %e, "Upload failed");
                SubmissionMetrics::record_outcome(e.kind().as_str());
            }
        }
        outcome
    }

    async fn send(
        &self,
        document: &XmlDocument,
        company: &str,
        compress: bool,
        retries: Option<u32>,
    ) -> SubmissionResult<TrackId> {
        if document.is_blank() {
            return Err(SubmissionError::EmptyPayload);
        }

        let (rut_sender, dv_sender) = TaxpayerId::parse(&self.certificate.id)?.decompose();
        let (rut_company, dv_company) = TaxpayerId::parse(company)?.decompose();

        let xml = document.save_xml()?;
        let (artifact, mime_type) = self.stage(&xml, compress)?;

        let token = self
            .token_manager
            .get_token(&self.certificate)
            .await
            .map_err(SubmissionError::Authentication)?;

        let request = UploadRequest {
            url: self.config.url(UPLOAD_PATH),
            token,
            rut_sender,
            dv_sender,
            rut_company,
            dv_company,
            file: UploadFile {
                path: artifact.path().to_path_buf(),
                file_name: format!("{}_{}", company, artifact.basename()),
                mime_type,
            },
        };

        let body = self.upload(&request, retries).await?;

        if let Err(e) = artifact.close() {
            warn!(error = %e, "Could not delete the upload artifact");
        }

        response::interpret(&body, &self.certificate.id)
    }

    /// Writes the payload to a temporary artifact, gzipped when requested and
    /// possible.
    fn stage(&self, xml: &[u8], compress: bool) -> SubmissionResult<(UploadArtifact, &'static str)> {
        let compressed = if compress {
            match self.compressor.try_compress(xml) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "Compression failed, uploading plain XML");
                    None
                }
            }
        } else {
            None
        };

        let (contents, suffix, mime_type) = match &compressed {
            Some(bytes) => (bytes.as_slice(), ".xml.gz", MIME_GZIP),
            None => (xml, ".xml", MIME_XML),
        };

        let artifact = self.storage.create(contents, suffix)?;
        SubmissionMetrics::record_payload_size(contents.len());
        info!(
            path = %artifact.path().display(),
            bytes = contents.len(),
            compressed = compressed.is_some(),
            sha256 = %hex::encode(Sha256::digest(contents)),
            "Upload artifact staged"
        );
        Ok((artifact, mime_type))
    }

    /// Posts the request until a usable body arrives or the budget runs out.
    /// Attempt `n` that fails is followed by a `200ms * n` pause.
    async fn upload(&self, request: &UploadRequest, retries: Option<u32>) -> SubmissionResult<String> {
        let attempts = self.config.effective_retries(retries);
        let mut last_failure: Option<AttemptFailure> = None;

        for attempt in 1..=attempts {
            SubmissionMetrics::record_attempt();
            debug!(attempt, attempts, url = %request.url, "Uploading XML to the SII");

            let failure = match self.transport.post(request).await {
                Ok(body) if body.is_empty() => AttemptFailure::Empty,
                Ok(body) if body == INTERNAL_FAULT_SENTINEL => AttemptFailure::InternalFault,
                Ok(body) => return Ok(body),
                Err(e) => AttemptFailure::Transport(e),
            };
            SubmissionMetrics::record_transient_failure(failure.reason());

            if attempt < attempts {
                let delay = Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt));
                warn!(
                    attempt,
                    reason = failure.reason().as_str(),
                    delay_ms = delay.as_millis() as u64,
                    "Upload attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            last_failure = Some(failure);
        }

        Err(match last_failure {
            Some(failure) => failure.into_error(),
            None => SubmissionError::Transport {
                message: "No upload attempt was made: the retry budget is 0.".to_string(),
            },
        })
    }
}
