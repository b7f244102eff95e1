use std::sync::Arc;

use core_types::{ChatMessage, DocumentFile, KnowledgeBase, Notice};
use parking_lot::Mutex;
use tokio::sync::watch;

/// Target and file picked in the upload dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadJob {
    pub knowledge_base: KnowledgeBase,
    pub file: Option<DocumentFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    CreateKnowledgeBase { draft: String },
    Upload(UploadJob),
}

/// Read model handed to the rendering shell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub knowledge_bases: Vec<KnowledgeBase>,
    pub pending_creates: Vec<String>,
    pub selected: Option<KnowledgeBase>,
    pub messages: Vec<ChatMessage>,
    pub awaiting_replies: usize,
    pub dialog: Option<Dialog>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    knowledge_bases: Vec<KnowledgeBase>,
    pending_creates: Vec<String>,
    selected: Option<KnowledgeBase>,
    messages: Vec<ChatMessage>,
    awaiting_replies: usize,
    dialog: Option<Dialog>,
    notices: Vec<Notice>,
}

impl SessionState {
    pub(crate) fn replace_knowledge_bases(&mut self, knowledge_bases: Vec<KnowledgeBase>) {
        self.knowledge_bases = knowledge_bases;
    }

    pub(crate) fn is_known(&self, kb_id: &str) -> bool {
        self.knowledge_bases.iter().any(|kb| kb.id == kb_id)
    }

    pub(crate) fn find(&self, kb_id: &str) -> Option<&KnowledgeBase> {
        self.knowledge_bases.iter().find(|kb| kb.id == kb_id)
    }

    /// Tentative entry; `false` when the name is already taken or pending.
    pub(crate) fn begin_create(&mut self, name: &str) -> bool {
        if self.is_known(name) || self.pending_creates.iter().any(|pending| pending == name) {
            return false;
        }
        self.pending_creates.push(name.to_owned());
        true
    }

    /// Returns `false` if the echoed id was already registered.
    pub(crate) fn confirm_create(&mut self, name: &str, created: KnowledgeBase) -> bool {
        self.remove_pending(name);
        if self.is_known(&created.id) {
            return false;
        }
        self.knowledge_bases.push(created);
        true
    }

    pub(crate) fn rollback_create(&mut self, name: &str) {
        self.remove_pending(name);
    }

    fn remove_pending(&mut self, name: &str) {
        if let Some(index) = self.pending_creates.iter().position(|pending| pending == name) {
            self.pending_creates.remove(index);
        }
    }

    pub(crate) fn select(&mut self, knowledge_base: KnowledgeBase) {
        self.selected = Some(knowledge_base);
    }

    pub(crate) fn selected(&self) -> Option<&KnowledgeBase> {
        self.selected.as_ref()
    }

    pub(crate) fn append_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub(crate) fn query_started(&mut self) {
        self.awaiting_replies += 1;
    }

    pub(crate) fn query_settled(&mut self) {
        self.awaiting_replies = self.awaiting_replies.saturating_sub(1);
    }

    pub(crate) fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub(crate) fn dialog_mut(&mut self) -> Option<&mut Dialog> {
        self.dialog.as_mut()
    }

    pub(crate) fn open_dialog(&mut self, dialog: Dialog) {
        self.dialog = Some(dialog);
    }

    pub(crate) fn close_dialog(&mut self) -> Option<Dialog> {
        self.dialog.take()
    }

    /// Drops the upload job once `file_name` reached `knowledge_base`.
    pub(crate) fn clear_upload_job(&mut self, knowledge_base: &KnowledgeBase, file_name: &str) {
        let finished = matches!(
            &self.dialog,
            Some(Dialog::Upload(job))
                if &job.knowledge_base == knowledge_base
                    && job.file.as_ref().is_some_and(|file| file.file_name == file_name)
        );
        if finished {
            self.dialog = None;
        }
    }

    pub(crate) fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            knowledge_bases: self.knowledge_bases.clone(),
            pending_creates: self.pending_creates.clone(),
            selected: self.selected.clone(),
            messages: self.messages.clone(),
            awaiting_replies: self.awaiting_replies,
            dialog: self.dialog.clone(),
            notices: self.notices.clone(),
        }
    }
}

/// State of one user session, shared by the controllers and the shell.
///
/// The lock is only taken inside [`Session::update`] and never across an
/// await point; every update bumps a revision counter that subscribers can
/// watch to re-render.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            revision: Arc::new(revision),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Hands pending notices to the caller, oldest first.
    pub fn drain_notices(&self) -> Vec<Notice> {
        let drained = std::mem::take(&mut self.state.lock().notices);
        if !drained.is_empty() {
            self.bump();
        }
        drained
    }

    pub(crate) fn update<R>(&self, apply: impl FnOnce(&mut SessionState) -> R) -> R {
        let result = {
            let mut state = self.state.lock();
            apply(&mut state)
        };
        self.bump();
        result
    }

    /// Like [`Session::update`], but the revision only moves when `apply` succeeds.
    pub(crate) fn try_update<R, E>(
        &self,
        apply: impl FnOnce(&mut SessionState) -> Result<R, E>,
    ) -> Result<R, E> {
        let result = {
            let mut state = self.state.lock();
            apply(&mut state)
        };
        if result.is_ok() {
            self.bump();
        }
        result
    }

    pub(crate) fn read<R>(&self, inspect: impl FnOnce(&SessionState) -> R) -> R {
        inspect(&self.state.lock())
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
