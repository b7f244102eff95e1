use std::sync::Arc;

use async_trait::async_trait;
use core_types::{ChatQuery, DEMO_REPLIES, KnowledgeService, ReplyOrigin, ServiceError};
use rand::seq::SliceRandom;
use tracing::warn;

/// Source of chat replies for a query against one knowledge base.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    async fn reply(&self, query: &ChatQuery) -> Result<String, ServiceError>;
}

pub struct RemoteReplyProvider {
    service: Arc<dyn KnowledgeService>,
}

impl RemoteReplyProvider {
    pub fn new(service: Arc<dyn KnowledgeService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ReplyProvider for RemoteReplyProvider {
    async fn reply(&self, query: &ChatQuery) -> Result<String, ServiceError> {
        self.service.query(query).await
    }
}

/// Canned replies, tagged with the knowledge base so they read as degraded.
#[derive(Debug, Clone)]
pub struct SyntheticReplyProvider {
    sentences: Vec<String>,
}

impl Default for SyntheticReplyProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SyntheticReplyProvider {
    pub fn new(sentences: Vec<String>) -> Self {
        let sentences = if sentences.is_empty() {
            DEMO_REPLIES.iter().map(|sentence| sentence.to_string()).collect()
        } else {
            sentences
        };
        Self { sentences }
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    pub fn compose(&self, kb_id: &str) -> String {
        let sentence = self
            .sentences
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEMO_REPLIES[0]);
        format!("{sentence} [demo reply · {kb_id}]")
    }
}

#[async_trait]
impl ReplyProvider for SyntheticReplyProvider {
    async fn reply(&self, query: &ChatQuery) -> Result<String, ServiceError> {
        Ok(self.compose(&query.kb_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub origin: ReplyOrigin,
}

/// Asks `primary` once and falls back to synthetic text on any failure.
pub struct DegradeOnFailure {
    primary: Arc<dyn ReplyProvider>,
    fallback: SyntheticReplyProvider,
}

impl DegradeOnFailure {
    pub fn new(primary: Arc<dyn ReplyProvider>, fallback: SyntheticReplyProvider) -> Self {
        Self { primary, fallback }
    }

    pub async fn answer(&self, query: &ChatQuery) -> Reply {
        match self.primary.reply(query).await {
            Ok(text) => Reply {
                text,
                origin: ReplyOrigin::Remote,
            },
            Err(err) => {
                warn!(kb_id = %query.kb_id, error = %err, "chat query failed, using synthetic reply");
                Reply {
                    text: self.fallback.compose(&query.kb_id),
                    origin: ReplyOrigin::Synthetic,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core_types::KnowledgeBase;

    use super::*;

    struct Failing;

    #[async_trait]
    impl ReplyProvider for Failing {
        async fn reply(&self, _query: &ChatQuery) -> Result<String, ServiceError> {
            Err(ServiceError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            })
        }
    }

    #[test]
    fn synthetic_reply_names_the_knowledge_base() {
        let provider = SyntheticReplyProvider::new(vec!["Only sentence.".to_string()]);
        assert_eq!(provider.compose("docs"), "Only sentence. [demo reply · docs]");
    }

    #[test]
    fn empty_pool_falls_back_to_defaults() {
        let provider = SyntheticReplyProvider::new(Vec::new());
        assert_eq!(provider.sentences().len(), DEMO_REPLIES.len());
        let text = provider.compose("finance");
        assert!(DEMO_REPLIES.iter().any(|sentence| text.starts_with(sentence)));
    }

    #[tokio::test]
    async fn degrades_to_synthetic_on_failure() {
        let policy = DegradeOnFailure::new(Arc::new(Failing), SyntheticReplyProvider::default());
        let reply = policy
            .answer(&ChatQuery::new("hello", &KnowledgeBase::new("docs")))
            .await;
        assert_eq!(reply.origin, ReplyOrigin::Synthetic);
        assert!(reply.text.ends_with("[demo reply · docs]"));
    }

    #[tokio::test]
    async fn keeps_primary_reply_when_available() {
        let policy = DegradeOnFailure::new(
            Arc::new(SyntheticReplyProvider::new(vec!["primary".to_string()])),
            SyntheticReplyProvider::new(vec!["fallback".to_string()]),
        );
        let reply = policy
            .answer(&ChatQuery::new("hello", &KnowledgeBase::new("docs")))
            .await;
        assert_eq!(reply.origin, ReplyOrigin::Remote);
        assert!(reply.text.starts_with("primary"));
    }
}
