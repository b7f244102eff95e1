use std::sync::Arc;
use std::time::Duration;

use core_types::{DEMO_KNOWLEDGE_BASES, KnowledgeBase, KnowledgeService, Notice, ServiceError};
use tracing::{debug, info, warn};

use crate::Rejection;
use crate::session::Session;

pub const DEFAULT_SETTLING_DELAY: Duration = Duration::from_millis(600);

/// Placeholder registry served, after a short delay, when a fetch fails.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackKnowledgeBases {
    pub settling_delay: Duration,
    pub entries: Vec<KnowledgeBase>,
}

impl Default for FallbackKnowledgeBases {
    fn default() -> Self {
        Self {
            settling_delay: DEFAULT_SETTLING_DELAY,
            entries: DEMO_KNOWLEDGE_BASES
                .iter()
                .map(|id| KnowledgeBase::new(*id))
                .collect(),
        }
    }
}

impl FallbackKnowledgeBases {
    /// An empty `entries` list falls back to the demo pair.
    pub fn new(settling_delay: Duration, entries: Vec<KnowledgeBase>) -> Self {
        let entries = if entries.is_empty() {
            Self::default().entries
        } else {
            entries
        };
        Self {
            settling_delay,
            entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(KnowledgeBase),
    Rejected(Rejection),
    Failed(ServiceError),
}

pub struct KnowledgeBaseRegistryClient {
    service: Arc<dyn KnowledgeService>,
    fallback: FallbackKnowledgeBases,
}

impl KnowledgeBaseRegistryClient {
    pub fn new(service: Arc<dyn KnowledgeService>, fallback: FallbackKnowledgeBases) -> Self {
        Self { service, fallback }
    }

    /// Remote registry in delivered order, or the fallback set on any failure.
    pub async fn fetch_all(&self) -> Vec<KnowledgeBase> {
        match self.service.list_knowledge_bases().await {
            Ok(knowledge_bases) => {
                info!(count = knowledge_bases.len(), "knowledge bases fetched");
                knowledge_bases
            }
            Err(err) => {
                warn!(
                    error = %err,
                    delay_ms = self.fallback.settling_delay.as_millis() as u64,
                    "knowledge base fetch failed, serving demo registry"
                );
                tokio::time::sleep(self.fallback.settling_delay).await;
                self.fallback.entries.clone()
            }
        }
    }

    /// Fetches and replaces the session registry wholesale.
    pub async fn refresh(&self, session: &Session) -> Vec<KnowledgeBase> {
        let knowledge_bases = self.fetch_all().await;
        session.update(|state| state.replace_knowledge_bases(knowledge_bases.clone()));
        knowledge_bases
    }

    /// Creates `name` remotely; the session holds it as pending until the
    /// service answers, then confirms or rolls it back.
    pub async fn create(&self, session: &Session, name: &str) -> CreateOutcome {
        let name = name.trim();
        if name.is_empty() {
            debug!("ignoring create with blank name");
            return CreateOutcome::Rejected(Rejection::EmptyInput);
        }

        let accepted = session.update(|state| {
            let accepted = state.begin_create(name);
            if !accepted {
                state.push_notice(Notice::DuplicateKnowledgeBase {
                    name: name.to_owned(),
                });
            }
            accepted
        });
        if !accepted {
            debug!(name, "knowledge base already registered or pending");
            return CreateOutcome::Rejected(Rejection::DuplicateName);
        }

        match self.service.create_knowledge_base(name).await {
            Ok(created) => {
                let appended = session.update(|state| {
                    let appended = state.confirm_create(name, created.clone());
                    state.push_notice(Notice::KnowledgeBaseCreated {
                        kb_id: created.id.clone(),
                    });
                    appended
                });
                if appended {
                    info!(kb_id = %created, "knowledge base created");
                } else {
                    warn!(kb_id = %created, requested = name, "service echoed an existing knowledge base");
                }
                CreateOutcome::Created(created)
            }
            Err(err) => {
                warn!(name, error = %err, "knowledge base create failed");
                session.update(|state| {
                    state.rollback_create(name);
                    state.push_notice(Notice::KnowledgeBaseCreateFailed {
                        name: name.to_owned(),
                    });
                });
                CreateOutcome::Failed(err)
            }
        }
    }
}
