use std::sync::atomic::{AtomicU64, Ordering};

use core_types::{ChatMessage, ChatQuery, MessageId, Notice, ReplyOrigin};
use tracing::debug;

use crate::Rejection;
use crate::reply::DegradeOnFailure;
use crate::session::Session;

/// A question already appended to the transcript and waiting for its reply.
#[derive(Debug)]
pub struct PendingQuery {
    sequence: u64,
    question: MessageId,
    query: ChatQuery,
}

impl PendingQuery {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn question(&self) -> MessageId {
        self.question
    }

    pub fn query(&self) -> &ChatQuery {
        &self.query
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Rejected(Rejection),
    Answered(ChatMessage),
    FallbackAnswered(ChatMessage),
}

/// Owns the message flow of a session.
///
/// Queries are not serialized: replies land in the order they arrive, and each
/// bot message carries the id of the question it answers.
pub struct ChatSessionController {
    replies: DegradeOnFailure,
    sequence: AtomicU64,
}

impl ChatSessionController {
    pub fn new(replies: DegradeOnFailure) -> Self {
        Self {
            replies,
            sequence: AtomicU64::new(0),
        }
    }

    /// Validates `text` and appends the user message without suspending.
    pub fn begin(&self, session: &Session, text: &str) -> Result<PendingQuery, Rejection> {
        if text.trim().is_empty() {
            return Err(Rejection::EmptyInput);
        }

        let pending = session.update(|state| {
            let Some(knowledge_base) = state.selected().cloned() else {
                state.push_notice(Notice::NoKnowledgeBaseSelected);
                return None;
            };
            let question = ChatMessage::user(text);
            let question_id = question.id;
            state.append_message(question);
            state.query_started();
            Some(PendingQuery {
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
                question: question_id,
                query: ChatQuery::new(text, &knowledge_base),
            })
        });

        let pending = pending.ok_or(Rejection::NoKnowledgeBaseSelected)?;
        debug!(
            seq = pending.sequence,
            kb_id = %pending.query.kb_id,
            "query awaiting reply"
        );
        Ok(pending)
    }

    /// Appends exactly one bot message for `pending`, remote or synthetic.
    pub async fn resolve(&self, session: &Session, pending: PendingQuery) -> SubmitOutcome {
        let reply = self.replies.answer(&pending.query).await;
        let message = ChatMessage::bot(reply.text, pending.question, reply.origin);

        session.update(|state| {
            state.append_message(message.clone());
            state.query_settled();
        });
        debug!(seq = pending.sequence, origin = ?reply.origin, "query settled");

        match reply.origin {
            ReplyOrigin::Remote => SubmitOutcome::Answered(message),
            ReplyOrigin::Synthetic => SubmitOutcome::FallbackAnswered(message),
        }
    }

    pub async fn submit(&self, session: &Session, text: &str) -> SubmitOutcome {
        match self.begin(session, text) {
            Ok(pending) => self.resolve(session, pending).await,
            Err(rejection) => SubmitOutcome::Rejected(rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use core_types::{DEMO_REPLIES, KnowledgeBase, Sender, ServiceError};

    use super::*;
    use crate::reply::{RemoteReplyProvider, SyntheticReplyProvider};
    use crate::test_support::{Call, FakeService};

    fn controller(service: Arc<FakeService>) -> ChatSessionController {
        ChatSessionController::new(DegradeOnFailure::new(
            Arc::new(RemoteReplyProvider::new(service)),
            SyntheticReplyProvider::default(),
        ))
    }

    fn session_with(selected: Option<&str>) -> Session {
        let session = Session::new();
        if let Some(kb_id) = selected {
            session.update(|state| state.select(KnowledgeBase::new(kb_id)));
        }
        session
    }

    #[tokio::test]
    async fn no_selection_blocks_the_query() {
        let service = FakeService::online(&["docs"]);
        let chat = controller(service.clone());
        let session = session_with(None);

        for text in ["hello", "What is the refund policy?"] {
            assert_eq!(
                chat.submit(&session, text).await,
                SubmitOutcome::Rejected(Rejection::NoKnowledgeBaseSelected)
            );
        }

        assert!(service.calls().is_empty());
        let snapshot = session.snapshot();
        assert!(snapshot.messages.is_empty());
        assert_eq!(
            snapshot.notices,
            vec![Notice::NoKnowledgeBaseSelected, Notice::NoKnowledgeBaseSelected]
        );
    }

    #[tokio::test]
    async fn blank_text_is_ignored_silently() {
        let service = FakeService::online(&["docs"]);
        let chat = controller(service.clone());
        let session = session_with(Some("docs"));
        let before = session.revision();

        assert_eq!(
            chat.submit(&session, "  \n").await,
            SubmitOutcome::Rejected(Rejection::EmptyInput)
        );
        assert!(service.calls().is_empty());
        assert_eq!(session.revision(), before);
    }

    #[tokio::test]
    async fn remote_reply_follows_question() {
        let service = FakeService::online(&["docs"]);
        service.reply_with(Ok("30 days".to_string()));
        let chat = controller(service.clone());
        let session = session_with(Some("docs"));

        let outcome = chat.submit(&session, "What is the refund policy?").await;
        assert!(matches!(outcome, SubmitOutcome::Answered(_)));

        let messages = session.snapshot().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "What is the refund policy?");
        assert_eq!(messages[1].sender, Sender::Bot);
        assert_eq!(messages[1].text, "30 days");
        assert_eq!(messages[1].in_reply_to, Some(messages[0].id));
        assert_eq!(
            service.calls(),
            vec![Call::Query(ChatQuery {
                query: "What is the refund policy?".to_string(),
                kb_id: "docs".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn server_error_yields_annotated_fallback() {
        let service = FakeService::online(&["docs"]);
        service.reply_with(Err(ServiceError::Status {
            status: 500,
            body: "boom".to_string(),
        }));
        let chat = controller(service);
        let session = session_with(Some("docs"));

        let outcome = chat.submit(&session, "What is the refund policy?").await;
        let SubmitOutcome::FallbackAnswered(reply) = outcome else {
            panic!("expected fallback reply, got {outcome:?}");
        };
        assert!(DEMO_REPLIES.iter().any(|sentence| reply.text.starts_with(sentence)));
        assert!(reply.text.contains("docs"));
        assert!(reply.is_synthetic());
        assert_eq!(session.snapshot().messages.len(), 2);
    }

    #[tokio::test]
    async fn every_accepted_query_adds_exactly_two_messages() {
        let service = FakeService::online(&["docs"]);
        let chat = controller(service.clone());
        let session = session_with(Some("docs"));

        for round in 0..4 {
            service.set_online(round % 2 == 0);
            let before = session.snapshot().messages.len();
            chat.submit(&session, &format!("question {round}")).await;
            assert_eq!(session.snapshot().messages.len(), before + 2);
        }
        assert_eq!(session.snapshot().awaiting_replies, 0);
    }

    #[tokio::test]
    async fn user_message_is_visible_before_reply_arrives() {
        let service = FakeService::online(&["docs"]);
        let gate = service.gate_next_reply();
        let chat = controller(service);
        let session = session_with(Some("docs"));

        let pending = chat.begin(&session, "still thinking?").expect("accepted");
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.awaiting_replies, 1);

        gate.send(Ok("done".to_string())).expect("gate open");
        chat.resolve(&session, pending).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.awaiting_replies, 0);
    }

    #[tokio::test]
    async fn replies_are_appended_in_arrival_order() {
        let service = FakeService::online(&["docs"]);
        let first_gate = service.gate_next_reply();
        let second_gate = service.gate_next_reply();
        let chat = controller(service);
        let session = session_with(Some("docs"));

        let release = async {
            second_gate.send(Ok("second answer".to_string())).expect("gate");
            tokio::task::yield_now().await;
            first_gate.send(Ok("first answer".to_string())).expect("gate");
        };
        futures::join!(
            chat.submit(&session, "first"),
            chat.submit(&session, "second"),
            release
        );

        let messages = session.snapshot().messages;
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "second answer", "first answer"]);
        assert_eq!(messages[2].in_reply_to, Some(messages[1].id));
        assert_eq!(messages[3].in_reply_to, Some(messages[0].id));
    }
}
