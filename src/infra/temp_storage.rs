use crate::app::ports::{TemporaryStoragePort, UploadArtifact};
use crate::constants::ARTIFACT_PREFIX;
use std::io::{self, Write};
use std::path::PathBuf;

/// Stages upload artifacts as `libredte_xml_document_for_upload_to_sii_*`
/// files, in the system temp dir unless another directory is given.
#[derive(Debug, Clone, Default)]
pub struct SystemTempStorage {
    dir: Option<PathBuf>,
}

impl SystemTempStorage {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }
}

impl TemporaryStoragePort for SystemTempStorage {
    fn create(&self, contents: &[u8], suffix: &str) -> io::Result<UploadArtifact> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(ARTIFACT_PREFIX).suffix(suffix);
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(contents)?;
        file.flush()?;
        Ok(UploadArtifact::new(file.into_temp_path()))
    }
}
