use std::sync::Arc;

use core_types::{DocumentFile, KnowledgeBase, KnowledgeService, Notice, ServiceError};
use tracing::{debug, info, warn};

use crate::Rejection;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Rejected(Rejection),
    Failed(ServiceError),
}

pub struct DocumentUploadController {
    service: Arc<dyn KnowledgeService>,
    accepted_extensions: Vec<String>,
}

impl DocumentUploadController {
    /// An empty extension list accepts any file.
    pub fn new(service: Arc<dyn KnowledgeService>, accepted_extensions: Vec<String>) -> Self {
        Self {
            service,
            accepted_extensions: accepted_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn accepts(&self, document: &DocumentFile) -> bool {
        if self.accepted_extensions.is_empty() {
            return true;
        }
        document
            .extension()
            .is_some_and(|ext| self.accepted_extensions.contains(&ext))
    }

    pub async fn upload(
        &self,
        session: &Session,
        document: Option<&DocumentFile>,
        knowledge_base: Option<&KnowledgeBase>,
    ) -> UploadOutcome {
        let Some(document) = document else {
            debug!("upload ignored: no file selected");
            return UploadOutcome::Rejected(Rejection::NoFileSelected);
        };
        let Some(knowledge_base) = knowledge_base else {
            debug!("upload ignored: no target knowledge base");
            return UploadOutcome::Rejected(Rejection::NoTargetKnowledgeBase);
        };
        if !self.accepts(document) {
            session.update(|state| {
                state.push_notice(Notice::UnsupportedDocument {
                    file_name: document.file_name.clone(),
                })
            });
            return UploadOutcome::Rejected(Rejection::UnsupportedFile);
        }

        match self.service.upload_document(knowledge_base, document).await {
            Ok(()) => {
                info!(kb_id = %knowledge_base, file = %document.file_name, "document uploaded");
                session.update(|state| {
                    state.clear_upload_job(knowledge_base, &document.file_name);
                    state.push_notice(Notice::DocumentUploaded {
                        file_name: document.file_name.clone(),
                        kb_id: knowledge_base.id.clone(),
                    });
                });
                UploadOutcome::Uploaded
            }
            Err(err) => {
                warn!(kb_id = %knowledge_base, file = %document.file_name, error = %err, "document upload failed");
                session.update(|state| {
                    state.push_notice(Notice::DocumentUploadFailed {
                        file_name: document.file_name.clone(),
                        kb_id: knowledge_base.id.clone(),
                    })
                });
                UploadOutcome::Failed(err)
            }
        }
    }
}
