use std::path::PathBuf;

pub const NEW_USAGE: &str = "/new <name>";
pub const SELECT_USAGE: &str = "/select <name>";
pub const UPLOAD_USAGE: &str = "/upload <kb> <path>";

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ListKnowledgeBases,
    Refresh,
    Create(String),
    Select(String),
    Upload { kb_id: String, path: PathBuf },
    Cancel,
    Quit,
    /// Free text, kept exactly as typed.
    Message(String),
    Usage(&'static str),
    Unknown(String),
}

/// Returns `None` for blank lines.
pub fn parse(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(Command::Message(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "help" => Command::Help,
        "kbs" => Command::ListKnowledgeBases,
        "refresh" => Command::Refresh,
        "cancel" => Command::Cancel,
        "quit" | "exit" => Command::Quit,
        "new" if args.is_empty() => Command::Usage(NEW_USAGE),
        "new" => Command::Create(args.to_string()),
        "select" if args.is_empty() => Command::Usage(SELECT_USAGE),
        "select" => Command::Select(args.to_string()),
        "upload" => match args.split_once(char::is_whitespace) {
            Some((kb_id, path)) if !path.trim().is_empty() => Command::Upload {
                kb_id: kb_id.to_string(),
                path: PathBuf::from(path.trim()),
            },
            _ => Command::Usage(UPLOAD_USAGE),
        },
        other => Command::Unknown(format!("/{other}")),
    };
    Some(command)
}
