use crate::app::ports::{UploadRequest, UploadTransportPort};
use crate::config::ConnectionConfig;
use crate::constants::{
    FIELD_DV_COMPANY, FIELD_DV_SENDER, FIELD_FILE, FIELD_RUT_COMPANY, FIELD_RUT_SENDER, REFERER, USER_AGENT,
};
use crate::xml::decode_latin1;
use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER as REFERER_HEADER, USER_AGENT as USER_AGENT_HEADER};
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Multipart uploader over `reqwest`.
///
/// Any HTTP status yields `Ok(body)`: the service reports failures in the
/// body, and `Error 500` is recognized there. The body is read as
/// ISO-8859-1.
pub struct ReqwestUploader {
    client: reqwest::Client,
}

impl ReqwestUploader {
    pub fn new(config: &ConnectionConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .danger_accept_invalid_hostnames(!config.verify_ssl)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UploadTransportPort for ReqwestUploader {
    async fn post(&self, request: &UploadRequest) -> Result<String, String> {
        let contents = tokio::fs::read(&request.file.path)
            .await
            .map_err(|e| format!("cannot read {}: {}", request.file.path.display(), e))?;
        let file = Part::bytes(contents)
            .file_name(request.file.file_name.clone())
            .mime_str(request.file.mime_type)
            .map_err(|e| e.to_string())?;

        let form = Form::new()
            .text(FIELD_RUT_SENDER, request.rut_sender.clone())
            .text(FIELD_DV_SENDER, request.dv_sender.clone())
            .text(FIELD_RUT_COMPANY, request.rut_company.clone())
            .text(FIELD_DV_COMPANY, request.dv_company.clone())
            .part(FIELD_FILE, file);

        let resp = self
            .client
            .post(&request.url)
            .header(USER_AGENT_HEADER, USER_AGENT)
            .header(REFERER_HEADER, REFERER)
            .header(COOKIE, format!("TOKEN={}", request.token))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
        Ok(decode_latin1(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_and_without_certificate_checks() {
        let strict = ConnectionConfig::default();
        assert!(strict.verify_ssl);
        assert!(ReqwestUploader::new(&strict).is_ok());

        let relaxed = ConnectionConfig {
            verify_ssl: false,
            ..ConnectionConfig::default()
        };
        assert!(ReqwestUploader::new(&relaxed).is_ok());
    }
}
