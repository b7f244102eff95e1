use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use core_types::{ChatQuery, DocumentFile, KnowledgeBase, KnowledgeService, ServiceError};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::registry::FallbackKnowledgeBases;
use crate::root::OrchestrationSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List,
    Create(String),
    Upload { kb_id: String, file_name: String },
    Query(ChatQuery),
}

type GatedReply = oneshot::Receiver<Result<String, ServiceError>>;

#[derive(Default)]
struct FakeState {
    online: bool,
    knowledge_bases: Vec<KnowledgeBase>,
    reply: Option<Result<String, ServiceError>>,
    gates: VecDeque<GatedReply>,
    calls: Vec<Call>,
}

/// In-memory knowledge service recording every call.
pub(crate) struct FakeService {
    state: Mutex<FakeState>,
}

impl FakeService {
    pub(crate) fn online(knowledge_bases: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                online: true,
                knowledge_bases: knowledge_bases.iter().map(|id| KnowledgeBase::new(*id)).collect(),
                ..FakeState::default()
            }),
        })
    }

    pub(crate) fn offline() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
        })
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    pub(crate) fn reply_with(&self, reply: Result<String, ServiceError>) {
        self.state.lock().reply = Some(reply);
    }

    /// The next query waits until the returned sender fires.
    pub(crate) fn gate_next_reply(&self) -> oneshot::Sender<Result<String, ServiceError>> {
        let (sender, receiver) = oneshot::channel();
        self.state.lock().gates.push_back(receiver);
        sender
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: Call) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.online {
            Ok(())
        } else {
            Err(ServiceError::Transport("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl KnowledgeService for FakeService {
    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ServiceError> {
        self.record(Call::List)?;
        Ok(self.state.lock().knowledge_bases.clone())
    }

    async fn create_knowledge_base(&self, kb_id: &str) -> Result<KnowledgeBase, ServiceError> {
        self.record(Call::Create(kb_id.to_string()))?;
        let created = KnowledgeBase::new(kb_id);
        self.state.lock().knowledge_bases.push(created.clone());
        Ok(created)
    }

    async fn upload_document(
        &self,
        knowledge_base: &KnowledgeBase,
        document: &DocumentFile,
    ) -> Result<(), ServiceError> {
        self.record(Call::Upload {
            kb_id: knowledge_base.id.clone(),
            file_name: document.file_name.clone(),
        })
    }

    async fn query(&self, query: &ChatQuery) -> Result<String, ServiceError> {
        self.record(Call::Query(query.clone()))?;
        let gate = self.state.lock().gates.pop_front();
        if let Some(gate) = gate {
            return gate
                .await
                .unwrap_or_else(|_| Err(ServiceError::Transport("gate dropped".to_string())));
        }
        let reply = self.state.lock().reply.clone();
        reply.unwrap_or_else(|| Ok(format!("answer to {}", query.query)))
    }
}

pub(crate) fn settings() -> OrchestrationSettings {
    OrchestrationSettings {
        fallback_knowledge_bases: FallbackKnowledgeBases::new(
            Duration::ZERO,
            vec![
                KnowledgeBase::new("demo-knowledge-base-1"),
                KnowledgeBase::new("demo-knowledge-base-2"),
            ],
        ),
        ..OrchestrationSettings::default()
    }
}
