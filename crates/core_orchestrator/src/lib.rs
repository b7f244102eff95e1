mod chat;
mod registry;
mod reply;
mod root;
mod session;
mod upload;

#[cfg(test)]
mod test_support;

pub use chat::{ChatSessionController, PendingQuery, SubmitOutcome};
pub use registry::{
    CreateOutcome, DEFAULT_SETTLING_DELAY, FallbackKnowledgeBases, KnowledgeBaseRegistryClient,
};
pub use reply::{
    DegradeOnFailure, RemoteReplyProvider, Reply, ReplyProvider, SyntheticReplyProvider,
};
pub use root::{Action, ActionOutcome, OrchestrationRoot, OrchestrationSettings};
pub use session::{Dialog, Session, SessionSnapshot, UploadJob};
pub use upload::{DocumentUploadController, UploadOutcome};

/// Input refused locally, before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyInput,
    DuplicateName,
    NoKnowledgeBaseSelected,
    NoFileSelected,
    NoTargetKnowledgeBase,
    UnsupportedFile,
    UnknownKnowledgeBase,
    NoOpenDialog,
}
