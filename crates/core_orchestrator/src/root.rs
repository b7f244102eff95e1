use std::sync::Arc;

use core_types::{
    DEFAULT_DOCUMENT_EXTENSIONS, DEMO_REPLIES, DocumentFile, KnowledgeBase, KnowledgeService,
};
use tracing::{debug, info};

use crate::Rejection;
use crate::chat::{ChatSessionController, PendingQuery, SubmitOutcome};
use crate::registry::{CreateOutcome, FallbackKnowledgeBases, KnowledgeBaseRegistryClient};
use crate::reply::{DegradeOnFailure, RemoteReplyProvider, SyntheticReplyProvider};
use crate::session::{Dialog, Session, UploadJob};
use crate::upload::{DocumentUploadController, UploadOutcome};

#[derive(Debug, Clone)]
pub struct OrchestrationSettings {
    pub fallback_knowledge_bases: FallbackKnowledgeBases,
    pub reply_sentences: Vec<String>,
    pub accepted_extensions: Vec<String>,
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            fallback_knowledge_bases: FallbackKnowledgeBases::default(),
            reply_sentences: DEMO_REPLIES.iter().map(|s| s.to_string()).collect(),
            accepted_extensions: DEFAULT_DOCUMENT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Everything the rendering shell can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RefreshKnowledgeBases,
    SelectKnowledgeBase(String),
    OpenCreateDialog,
    EditDraftName(String),
    SubmitCreateDialog,
    OpenUploadDialog(String),
    ChooseFile(DocumentFile),
    SubmitUploadDialog,
    CloseDialog,
    SendMessage(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied,
    Rejected(Rejection),
    Refreshed(Vec<KnowledgeBase>),
    Create(CreateOutcome),
    Upload(UploadOutcome),
    Chat(SubmitOutcome),
}

/// Composes the controllers around one [`Session`].
pub struct OrchestrationRoot {
    session: Session,
    registry: KnowledgeBaseRegistryClient,
    uploads: DocumentUploadController,
    chat: ChatSessionController,
}

impl OrchestrationRoot {
    pub fn new(service: Arc<dyn KnowledgeService>, settings: OrchestrationSettings) -> Self {
        let replies = DegradeOnFailure::new(
            Arc::new(RemoteReplyProvider::new(Arc::clone(&service))),
            SyntheticReplyProvider::new(settings.reply_sentences),
        );
        Self {
            session: Session::new(),
            registry: KnowledgeBaseRegistryClient::new(
                Arc::clone(&service),
                settings.fallback_knowledge_bases,
            ),
            uploads: DocumentUploadController::new(service, settings.accepted_extensions),
            chat: ChatSessionController::new(replies),
        }
    }

    /// Builds the root and performs the initial registry fetch.
    pub async fn init(service: Arc<dyn KnowledgeService>, settings: OrchestrationSettings) -> Self {
        let root = Self::new(service, settings);
        let knowledge_bases = root.registry.refresh(&root.session).await;
        info!(count = knowledge_bases.len(), "session initialised");
        root
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Synchronous half of sending: validation and the user message.
    pub fn begin_message(&self, text: &str) -> Result<PendingQuery, Rejection> {
        self.chat.begin(&self.session, text)
    }

    pub async fn finish_message(&self, pending: PendingQuery) -> SubmitOutcome {
        self.chat.resolve(&self.session, pending).await
    }

    pub async fn dispatch(&self, action: Action) -> ActionOutcome {
        debug!(?action, "dispatch");
        match action {
            Action::RefreshKnowledgeBases => {
                ActionOutcome::Refreshed(self.registry.refresh(&self.session).await)
            }
            Action::SelectKnowledgeBase(kb_id) => self.select(&kb_id),
            Action::OpenCreateDialog => {
                self.session.update(|state| {
                    state.open_dialog(Dialog::CreateKnowledgeBase {
                        draft: String::new(),
                    })
                });
                ActionOutcome::Applied
            }
            Action::EditDraftName(name) => self.edit_draft(name),
            Action::SubmitCreateDialog => self.submit_create_dialog().await,
            Action::OpenUploadDialog(kb_id) => self.open_upload_dialog(&kb_id),
            Action::ChooseFile(file) => self.choose_file(file),
            Action::SubmitUploadDialog => self.submit_upload_dialog().await,
            Action::CloseDialog => self.applied(self.session.try_update(|state| {
                state
                    .close_dialog()
                    .map(drop)
                    .ok_or(Rejection::NoOpenDialog)
            })),
            Action::SendMessage(text) => {
                ActionOutcome::Chat(self.chat.submit(&self.session, &text).await)
            }
        }
    }

    fn applied(&self, result: Result<(), Rejection>) -> ActionOutcome {
        match result {
            Ok(()) => ActionOutcome::Applied,
            Err(rejection) => {
                debug!(?rejection, "action rejected");
                ActionOutcome::Rejected(rejection)
            }
        }
    }

    fn select(&self, kb_id: &str) -> ActionOutcome {
        self.applied(self.session.try_update(|state| {
            let knowledge_base = state
                .find(kb_id)
                .cloned()
                .ok_or(Rejection::UnknownKnowledgeBase)?;
            state.select(knowledge_base);
            Ok(())
        }))
    }

    fn edit_draft(&self, name: String) -> ActionOutcome {
        self.applied(self.session.try_update(|state| match state.dialog_mut() {
            Some(Dialog::CreateKnowledgeBase { draft }) => {
                *draft = name;
                Ok(())
            }
            _ => Err(Rejection::NoOpenDialog),
        }))
    }

    async fn submit_create_dialog(&self) -> ActionOutcome {
        let draft = self.session.read(|state| match state.dialog() {
            Some(Dialog::CreateKnowledgeBase { draft }) => Some(draft.clone()),
            _ => None,
        });
        let Some(draft) = draft else {
            return ActionOutcome::Rejected(Rejection::NoOpenDialog);
        };

        let outcome = self.registry.create(&self.session, &draft).await;
        if matches!(outcome, CreateOutcome::Created(_)) {
            self.session.update(|state| {
                if matches!(state.dialog(), Some(Dialog::CreateKnowledgeBase { .. })) {
                    state.close_dialog();
                }
            });
        }
        ActionOutcome::Create(outcome)
    }

    fn open_upload_dialog(&self, kb_id: &str) -> ActionOutcome {
        self.applied(self.session.try_update(|state| {
            let knowledge_base = state
                .find(kb_id)
                .cloned()
                .ok_or(Rejection::UnknownKnowledgeBase)?;
            state.open_dialog(Dialog::Upload(UploadJob {
                knowledge_base,
                file: None,
            }));
            Ok(())
        }))
    }

    fn choose_file(&self, file: DocumentFile) -> ActionOutcome {
        self.applied(self.session.try_update(|state| match state.dialog_mut() {
            Some(Dialog::Upload(job)) => {
                job.file = Some(file);
                Ok(())
            }
            _ => Err(Rejection::NoOpenDialog),
        }))
    }

    async fn submit_upload_dialog(&self) -> ActionOutcome {
        let job = self.session.read(|state| match state.dialog() {
            Some(Dialog::Upload(job)) => Some(job.clone()),
            _ => None,
        });
        let Some(job) = job else {
            return ActionOutcome::Rejected(Rejection::NoOpenDialog);
        };

        ActionOutcome::Upload(
            self.uploads
                .upload(&self.session, job.file.as_ref(), Some(&job.knowledge_base))
                .await,
        )
    }
}
