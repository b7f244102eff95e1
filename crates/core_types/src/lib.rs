use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type MessageId = Uuid;

/// Registry shown while the knowledge service is unreachable.
pub const DEMO_KNOWLEDGE_BASES: [&str; 2] = ["demo-knowledge-base-1", "demo-knowledge-base-2"];

/// Extensions offered by the upload picker.
pub const DEFAULT_DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "txt", "doc", "docx"];

/// Sentence pool for synthetic chat replies.
pub const DEMO_REPLIES: &[&str] = &[
    "The knowledge service is unavailable right now, so this is a preview answer.",
    "Based on typical documents in this collection, the answer usually sits in the most recent policy section.",
    "I could not consult the indexed documents, but the uploaded sources should cover this topic.",
    "This reply was generated offline; ask again once the service is back for a sourced answer.",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UiLanguage {
    ZhCn,
    EnUs,
}

/// A named collection of indexed documents on the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(transparent)]
pub struct KnowledgeBase {
    pub id: String,
}

impl KnowledgeBase {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOrigin {
    Remote,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// For bot replies, the user message being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ReplyOrigin>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v4(),
            sender: Sender::User,
            text: text.into(),
            created_at: Utc::now(),
            in_reply_to: None,
            origin: None,
        }
    }

    pub fn bot(text: impl Into<String>, in_reply_to: MessageId, origin: ReplyOrigin) -> Self {
        Self {
            id: MessageId::new_v4(),
            sender: Sender::Bot,
            text: text.into(),
            created_at: Utc::now(),
            in_reply_to: Some(in_reply_to),
            origin: Some(origin),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == Some(ReplyOrigin::Synthetic)
    }
}

/// Wire body of a chat query.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ChatQuery {
    pub query: String,
    pub kb_id: String,
}

impl ChatQuery {
    pub fn new(query: impl Into<String>, knowledge_base: &KnowledgeBase) -> Self {
        Self {
            query: query.into(),
            kb_id: knowledge_base.id.clone(),
        }
    }
}

/// Raw document content selected for upload.
#[derive(Clone, Eq, PartialEq)]
pub struct DocumentFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl fmt::Debug for DocumentFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentFile")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("service responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected payload: {0}")]
    Payload(String),
}

/// Remote knowledge service consumed by the controllers.
#[async_trait]
pub trait KnowledgeService: Send + Sync {
    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ServiceError>;

    async fn create_knowledge_base(&self, kb_id: &str) -> Result<KnowledgeBase, ServiceError>;

    async fn upload_document(
        &self,
        knowledge_base: &KnowledgeBase,
        document: &DocumentFile,
    ) -> Result<(), ServiceError>;

    async fn query(&self, query: &ChatQuery) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible notification raised by a controller.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    KnowledgeBaseCreated { kb_id: String },
    KnowledgeBaseCreateFailed { name: String },
    DuplicateKnowledgeBase { name: String },
    NoKnowledgeBaseSelected,
    DocumentUploaded { file_name: String, kb_id: String },
    DocumentUploadFailed { file_name: String, kb_id: String },
    UnsupportedDocument { file_name: String },
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::KnowledgeBaseCreated { .. } | Notice::DocumentUploaded { .. } => {
                NoticeLevel::Info
            }
            Notice::DuplicateKnowledgeBase { .. }
            | Notice::NoKnowledgeBaseSelected
            | Notice::UnsupportedDocument { .. } => NoticeLevel::Warning,
            Notice::KnowledgeBaseCreateFailed { .. } | Notice::DocumentUploadFailed { .. } => {
                NoticeLevel::Error
            }
        }
    }

    /// Translation key in the `i18n` catalogue.
    pub fn key(&self) -> &'static str {
        match self {
            Notice::KnowledgeBaseCreated { .. } => "notice.kb.created",
            Notice::KnowledgeBaseCreateFailed { .. } => "notice.kb.create_failed",
            Notice::DuplicateKnowledgeBase { .. } => "notice.kb.duplicate",
            Notice::NoKnowledgeBaseSelected => "notice.chat.no_kb",
            Notice::DocumentUploaded { .. } => "notice.upload.done",
            Notice::DocumentUploadFailed { .. } => "notice.upload.failed",
            Notice::UnsupportedDocument { .. } => "notice.upload.unsupported",
        }
    }

    pub fn args(&self) -> Vec<(&'static str, &str)> {
        match self {
            Notice::KnowledgeBaseCreated { kb_id } => vec![("kb", kb_id.as_str())],
            Notice::KnowledgeBaseCreateFailed { name } | Notice::DuplicateKnowledgeBase { name } => {
                vec![("kb", name.as_str())]
            }
            Notice::NoKnowledgeBaseSelected => Vec::new(),
            Notice::DocumentUploaded { file_name, kb_id }
            | Notice::DocumentUploadFailed { file_name, kb_id } => {
                vec![("file", file_name.as_str()), ("kb", kb_id.as_str())]
            }
            Notice::UnsupportedDocument { file_name } => vec![("file", file_name.as_str())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knowledge_base_serializes_as_plain_string() {
        let kbs: Vec<KnowledgeBase> =
            serde_json::from_str(r#"["finance","docs"]"#).expect("parse kbs");
        assert_eq!(kbs, vec![KnowledgeBase::new("finance"), KnowledgeBase::new("docs")]);
        assert_eq!(
            serde_json::to_string(&kbs[0]).expect("serialize kb"),
            "\"finance\""
        );
    }

    #[test]
    fn bot_message_links_to_question() {
        let question = ChatMessage::user("hi");
        let reply = ChatMessage::bot("hello", question.id, ReplyOrigin::Synthetic);
        assert_eq!(reply.sender, Sender::Bot);
        assert_eq!(reply.in_reply_to, Some(question.id));
        assert!(reply.is_synthetic());
        assert!(!question.is_synthetic());
    }

    #[test]
    fn document_extension_is_lowercased() {
        assert_eq!(
            DocumentFile::new("Report.PDF", b"x".to_vec()).extension().as_deref(),
            Some("pdf")
        );
        assert_eq!(DocumentFile::new("README", Vec::new()).extension(), None);
    }

    #[test]
    fn notice_levels_follow_outcome() {
        assert_eq!(Notice::NoKnowledgeBaseSelected.level(), NoticeLevel::Warning);
        let failed = Notice::DocumentUploadFailed {
            file_name: "a.pdf".to_string(),
            kb_id: "docs".to_string(),
        };
        assert_eq!(failed.level(), NoticeLevel::Error);
        assert_eq!(failed.args(), vec![("file", "a.pdf"), ("kb", "docs")]);
    }
}
