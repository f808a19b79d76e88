use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use shared::{domain::CourseId, protocol::UploadReceipt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::ActionError,
    gateway::{call_json, GatewayRequest, RequestGateway},
    materials::MaterialsStore,
    workflow::{Notifier, Slot, Workflow, WorkflowSnapshot},
};

/// Size shown to users as the upload limit. Not enforced.
pub const ADVISORY_MAX_BYTES: usize = 10 * 1024 * 1024;
/// Extensions shown to users as supported. Not enforced.
pub const ADVISORY_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadAdvisory {
    pub supported_extension: bool,
    pub within_size_hint: bool,
}

impl UploadAdvisory {
    pub fn is_clean(&self) -> bool {
        self.supported_extension && self.within_size_hint
    }
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            filename,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read upload file '{}'", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("upload path '{}' has no file name", path.display()))?;
        Ok(Self::new(filename, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// How the file compares to the PDF/TXT, 10 MB hint shown next to the picker.
    pub fn advisory(&self) -> UploadAdvisory {
        let extension = Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        UploadAdvisory {
            supported_extension: extension
                .as_deref()
                .is_some_and(|ext| ADVISORY_EXTENSIONS.contains(&ext)),
            within_size_hint: self.len() <= ADVISORY_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub last_receipt: Option<UploadReceipt>,
}

/// Sends a material file to the backend, then refreshes the material list.
pub struct UploadFlow {
    gateway: Arc<dyn RequestGateway>,
    materials: Arc<MaterialsStore>,
    course_id: CourseId,
    slot: Mutex<Slot<UploadState>>,
    notifier: Notifier,
}

impl UploadFlow {
    pub(crate) fn new(
        gateway: Arc<dyn RequestGateway>,
        materials: Arc<MaterialsStore>,
        course_id: CourseId,
        notifier: Notifier,
    ) -> Self {
        Self {
            gateway,
            materials,
            course_id,
            slot: Mutex::new(Slot::new(Workflow::Upload, UploadState::default())),
            notifier,
        }
    }

    /// Uploads `file` as the single multipart field `file`.
    ///
    /// Extension and size are not checked here; the backend decides. After a
    /// successful upload the material list is refreshed exactly once; a failed
    /// refresh is recorded on the materials workflow, not on the upload.
    pub async fn submit(&self, file: UploadFile) -> Result<UploadReceipt, ActionError> {
        let advisory = file.advisory();
        if !advisory.is_clean() {
            warn!(
                file = %file.filename,
                bytes = file.len(),
                supported_extension = advisory.supported_extension,
                within_size_hint = advisory.within_size_hint,
                "uploading file outside the advertised limits"
            );
        }

        let ticket = self.slot.lock().await.begin()?;
        self.notifier.busy(Workflow::Upload, true);

        let filename = file.filename.clone();
        let outcome: Result<UploadReceipt, _> = call_json(
            self.gateway.as_ref(),
            GatewayRequest::post_file("/materials/upload", file),
        )
        .await;

        let receipt = {
            let mut slot = self.slot.lock().await;
            slot.accept(ticket)?;
            match outcome {
                Ok(receipt) => {
                    slot.state.last_receipt = Some(receipt.clone());
                    slot.succeed();
                    receipt
                }
                Err(err) => {
                    let failure = err.to_failure();
                    slot.fail(failure.clone());
                    drop(slot);
                    warn!(file = %filename, error = %err, "upload failed");
                    self.notifier.settled(Workflow::Upload, Some(failure));
                    return Err(err.into());
                }
            }
        };
        info!(file = %filename, material = %receipt.material_id, "material uploaded");
        self.notifier.settled(Workflow::Upload, None);

        if let Err(err) = self.materials.refresh(&self.course_id).await {
            warn!(error = %err, "material list refresh after upload failed");
        }
        Ok(receipt)
    }

    /// Submits the first of the files handed over by a picker or a drop.
    pub async fn submit_dropped(
        &self,
        files: Vec<UploadFile>,
    ) -> Result<UploadReceipt, ActionError> {
        let file = files
            .into_iter()
            .next()
            .ok_or_else(|| ActionError::Validation("no file provided".into()))?;
        self.submit(file).await
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot<UploadState> {
        self.slot.lock().await.snapshot()
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
