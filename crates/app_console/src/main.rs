mod command;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use command::Command;
use config::{AppConfig, ConfigStore};
use core_orchestrator::{
    Action, ActionOutcome, FallbackKnowledgeBases, OrchestrationRoot, OrchestrationSettings,
    Rejection, Session,
};
use core_types::{ChatMessage, DocumentFile, KnowledgeBase, Notice, NoticeLevel, Sender};
use i18n::I18n;
use service_http::HttpKnowledgeService;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let mut data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir.push("kbdesk");
    if let Err(err) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to prepare data dir: {err}");
    }
    let _log_guard = init_local_logger(&data_dir.join("logs"));

    let mut config = load_config();
    config.apply_env_overrides();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to create tokio runtime: {err}");
            return;
        }
    };

    if let Err(err) = runtime.block_on(run(config)) {
        error!("shell stopped: {err:#}");
        eprintln!("{err:#}");
    }
}

fn load_config() -> AppConfig {
    match ConfigStore::from_default_location().and_then(|store| store.load_or_init()) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load config: {err:#}");
            AppConfig::default()
        }
    }
}

fn orchestration_settings(config: &AppConfig) -> OrchestrationSettings {
    OrchestrationSettings {
        fallback_knowledge_bases: FallbackKnowledgeBases::new(
            config.fallback.settling_delay(),
            config
                .fallback
                .knowledge_bases
                .iter()
                .map(KnowledgeBase::new)
                .collect(),
        ),
        reply_sentences: config.fallback.replies.clone(),
        accepted_extensions: config.upload.accepted_extensions.clone(),
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let i18n = Arc::new(I18n::new(config.language));
    let service = HttpKnowledgeService::with_timeout(
        config.service.base_url.clone(),
        config.service.request_timeout(),
    )
    .context("failed to build http client")?;
    info!(
        base_url = service.base_url(),
        language = ?i18n.language(),
        "starting shell"
    );

    let root = Arc::new(
        OrchestrationRoot::init(Arc::new(service), orchestration_settings(&config)).await,
    );

    println!("{}", i18n.t("app.title"));
    println!("{}", i18n.tf("shell.ready", &[("url", config.service.base_url.as_str())]));
    print_knowledge_bases(&i18n, root.session());

    let session = root.session().clone();
    tokio::spawn(render_loop(session.clone(), Arc::clone(&i18n), session.subscribe()));

    let mut replies = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        while replies.try_join_next().is_some() {}
        let Some(command) = command::parse(&line) else {
            continue;
        };
        if command == Command::Quit {
            break;
        }
        handle(&root, &i18n, &mut replies, command).await;
    }

    let abandoned = abandon_replies(&mut replies).await;
    if abandoned > 0 {
        warn!(abandoned, "quitting with replies still in flight");
    }
    println!("{}", i18n.t("shell.bye"));
    Ok(())
}

async fn handle(
    root: &Arc<OrchestrationRoot>,
    i18n: &I18n,
    replies: &mut JoinSet<()>,
    command: Command,
) {
    match command {
        Command::Help => println!("{}", i18n.t("shell.help")),
        Command::ListKnowledgeBases => print_knowledge_bases(i18n, root.session()),
        Command::Refresh => {
            root.dispatch(Action::RefreshKnowledgeBases).await;
            print_knowledge_bases(i18n, root.session());
        }
        Command::Create(name) => {
            root.dispatch(Action::OpenCreateDialog).await;
            root.dispatch(Action::EditDraftName(name)).await;
            root.dispatch(Action::SubmitCreateDialog).await;
        }
        Command::Select(kb_id) => {
            let key = match root
                .dispatch(Action::SelectKnowledgeBase(kb_id.clone()))
                .await
            {
                ActionOutcome::Applied => "kb.selected",
                _ => "kb.unknown",
            };
            println!("{}", i18n.tf(key, &[("kb", kb_id.as_str())]));
        }
        Command::Upload { kb_id, path } => upload(root, i18n, kb_id, &path).await,
        Command::Cancel => {
            let outcome = root.dispatch(Action::CloseDialog).await;
            if outcome == ActionOutcome::Rejected(Rejection::NoOpenDialog) {
                println!("{}", i18n.t("shell.no_dialog"));
            }
        }
        Command::Message(text) => match root.begin_message(&text) {
            Ok(pending) => {
                debug!(
                    seq = pending.sequence(),
                    question = %pending.question(),
                    kb_id = %pending.query().kb_id,
                    "message queued"
                );
                let root = Arc::clone(root);
                replies.spawn(async move {
                    root.finish_message(pending).await;
                });
            }
            Err(rejection) => info!(?rejection, "message not sent"),
        },
        Command::Usage(usage) => {
            println!("{}", i18n.tf("shell.usage", &[("usage", usage)]))
        }
        Command::Unknown(name) => {
            println!("{}", i18n.tf("shell.unknown_command", &[("command", name.as_str())]))
        }
        Command::Quit => {}
    }
}

async fn upload(root: &OrchestrationRoot, i18n: &I18n, kb_id: String, path: &Path) {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read upload");
            let shown = path.display().to_string();
            println!("{}", i18n.tf("shell.file_unreadable", &[("path", shown.as_str())]));
            return;
        }
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let opened = root.dispatch(Action::OpenUploadDialog(kb_id.clone())).await;
    if let ActionOutcome::Rejected(_) = opened {
        println!("{}", i18n.tf("kb.unknown", &[("kb", kb_id.as_str())]));
        return;
    }
    root.dispatch(Action::ChooseFile(DocumentFile::new(file_name, bytes)))
        .await;
    root.dispatch(Action::SubmitUploadDialog).await;
}

/// Cancels unfinished reply tasks and returns how many were cut short.
async fn abandon_replies(replies: &mut JoinSet<()>) -> usize {
    while replies.try_join_next().is_some() {}
    let abandoned = replies.len();
    replies.shutdown().await;
    abandoned
}

fn print_knowledge_bases(i18n: &I18n, session: &Session) {
    let snapshot = session.snapshot();
    println!("{}:", i18n.t("kb.header"));
    if snapshot.knowledge_bases.is_empty() && snapshot.pending_creates.is_empty() {
        println!("  {}", i18n.t("kb.empty"));
    }
    for knowledge_base in &snapshot.knowledge_bases {
        let marker = if snapshot.selected.as_ref() == Some(knowledge_base) {
            "*"
        } else {
            " "
        };
        println!(" {marker} {knowledge_base}");
    }
    for name in &snapshot.pending_creates {
        println!("   {name} ({})", i18n.t("kb.pending"));
    }
}

/// Prints new messages and notices whenever the session changes.
async fn render_loop(session: Session, i18n: Arc<I18n>, mut changes: watch::Receiver<u64>) {
    let mut printed = 0;
    let mut awaiting = 0;
    loop {
        let snapshot = session.snapshot();
        for message in snapshot.messages.iter().skip(printed) {
            println!("{}", render_message(&i18n, message));
        }
        printed = snapshot.messages.len();
        if snapshot.awaiting_replies > awaiting {
            println!("  {}", i18n.t("chat.awaiting"));
        }
        awaiting = snapshot.awaiting_replies;

        for notice in session.drain_notices() {
            println!("{}", render_notice(&i18n, &notice));
        }

        if changes.changed().await.is_err() {
            break;
        }
    }
}

fn render_message(i18n: &I18n, message: &ChatMessage) -> String {
    let speaker = match message.sender {
        Sender::User => i18n.t("chat.you"),
        Sender::Bot => i18n.t("chat.bot"),
    };
    format!("{speaker}: {}", message.text)
}

fn render_notice(i18n: &I18n, notice: &Notice) -> String {
    let prefix = match notice.level() {
        NoticeLevel::Info => "[i]",
        NoticeLevel::Warning => "[!]",
        NoticeLevel::Error => "[x]",
    };
    format!("{prefix} {}", i18n.tf(notice.key(), &notice.args()))
}

fn init_local_logger(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = std::fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "kbdesk.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,app_console=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(writer)
        .init();

    guard
}
