use std::collections::BTreeMap;

use core_types::UiLanguage;

#[derive(Debug, Clone)]
pub struct I18n {
    lang: UiLanguage,
    zh_cn: BTreeMap<&'static str, &'static str>,
    en_us: BTreeMap<&'static str, &'static str>,
}

impl I18n {
    pub fn new(lang: UiLanguage) -> Self {
        Self {
            lang,
            zh_cn: zh_cn_map(),
            en_us: en_us_map(),
        }
    }

    pub fn language(&self) -> UiLanguage {
        self.lang
    }

    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        match self.lang {
            UiLanguage::ZhCn => self
                .zh_cn
                .get(key)
                .copied()
                .or_else(|| self.en_us.get(key).copied())
                .unwrap_or(key),
            UiLanguage::EnUs => self
                .en_us
                .get(key)
                .copied()
                .or_else(|| self.zh_cn.get(key).copied())
                .unwrap_or(key),
        }
    }

    /// Translates `key` and fills `{name}` placeholders from `args`.
    /// Unknown placeholders are left as written.
    /// Values are inserted verbatim, never rescanned for placeholders.
    pub fn tf(&self, key: &str, args: &[(&str, &str)]) -> String {
        let template = self.t(key);
        let mut text = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            text.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let name = &after[..close];
                args.iter()
                    .find(|(arg, _)| *arg == name)
                    .map(|(_, value)| (*value, close))
            });
            match value {
                Some((value, close)) => {
                    text.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    text.push('{');
                    rest = after;
                }
            }
        }
        text.push_str(rest);
        text
    }
}

fn zh_cn_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("app.title", "知识库问答"),
        ("chat.you", "我"),
        ("chat.bot", "助手"),
        ("chat.awaiting", "正在等待回复……"),
        ("kb.header", "知识库列表"),
        ("kb.empty", "暂无知识库"),
        ("kb.pending", "创建中"),
        ("kb.selected", "当前知识库：{kb}"),
        ("kb.unknown", "未找到知识库：{kb}"),
        ("notice.kb.created", "知识库 {kb} 创建成功"),
        ("notice.kb.create_failed", "知识库 {kb} 创建失败"),
        ("notice.kb.duplicate", "知识库 {kb} 已存在"),
        ("notice.chat.no_kb", "请先选择一个知识库"),
        ("notice.upload.done", "文件 {file} 已上传到 {kb}"),
        ("notice.upload.failed", "文件 {file} 上传到 {kb} 失败"),
        ("notice.upload.unsupported", "不支持的文件类型：{file}"),
        ("shell.ready", "已连接 {url}，输入 /help 查看命令"),
        (
            "shell.help",
            "/kbs 列出知识库 · /refresh 刷新 · /new <名称> 新建 · /select <名称> 选择 · /upload <知识库> <路径> 上传 · /cancel 关闭对话框 · /quit 退出；其他输入作为提问发送",
        ),
        ("shell.unknown_command", "未知命令：{command}"),
        ("shell.usage", "用法：{usage}"),
        ("shell.file_unreadable", "无法读取文件 {path}"),
        ("shell.no_dialog", "没有打开的对话框"),
        ("shell.bye", "再见"),
    ])
}

fn en_us_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("app.title", "Knowledge Base Chat"),
        ("chat.you", "You"),
        ("chat.bot", "Assistant"),
        ("chat.awaiting", "Waiting for a reply..."),
        ("kb.header", "Knowledge bases"),
        ("kb.empty", "No knowledge bases yet"),
        ("kb.pending", "creating"),
        ("kb.selected", "Selected knowledge base: {kb}"),
        ("kb.unknown", "Unknown knowledge base: {kb}"),
        ("notice.kb.created", "Knowledge base {kb} created"),
        ("notice.kb.create_failed", "Could not create knowledge base {kb}"),
        ("notice.kb.duplicate", "Knowledge base {kb} already exists"),
        ("notice.chat.no_kb", "Select a knowledge base first"),
        ("notice.upload.done", "Uploaded {file} to {kb}"),
        ("notice.upload.failed", "Could not upload {file} to {kb}"),
        ("notice.upload.unsupported", "Unsupported file type: {file}"),
        ("shell.ready", "Connected to {url}, type /help for commands"),
        (
            "shell.help",
            "/kbs list · /refresh reload · /new <name> create · /select <name> choose · /upload <kb> <path> add a document · /cancel close dialog · /quit exit; anything else is sent as a question",
        ),
        ("shell.unknown_command", "Unknown command: {command}"),
        ("shell.usage", "Usage: {usage}"),
        ("shell.file_unreadable", "Cannot read file {path}"),
        ("shell.no_dialog", "No dialog is open"),
        ("shell.bye", "Bye"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_chinese_translation() {
        let i18n = I18n::new(UiLanguage::ZhCn);
        assert_eq!(i18n.t("chat.bot"), "助手");
    }

    #[test]
    fn falls_back_to_key_when_missing() {
        let i18n = I18n::new(UiLanguage::EnUs);
        assert_eq!(i18n.t("not.exists"), "not.exists");
    }

    #[test]
    fn fills_placeholders() {
        let i18n = I18n::new(UiLanguage::EnUs);
        assert_eq!(
            i18n.tf("notice.upload.done", &[("file", "a.pdf"), ("kb", "docs")]),
            "Uploaded a.pdf to docs"
        );
        assert_eq!(i18n.tf("kb.selected", &[]), "Selected knowledge base: {kb}");
    }

    #[test]
    fn argument_values_are_not_expanded() {
        let i18n = I18n::new(UiLanguage::EnUs);
        let notice = core_types::Notice::DocumentUploaded {
            file_name: "{kb}.pdf".to_string(),
            kb_id: "docs".to_string(),
        };
        assert_eq!(
            i18n.tf(notice.key(), &notice.args()),
            "Uploaded {kb}.pdf to docs"
        );
        assert_eq!(
            i18n.tf("kb.unknown", &[("kb", "{x} and {")]),
            "Unknown knowledge base: {x} and {"
        );
    }

    #[test]
    fn every_notice_key_is_translated() {
        let notices = [
            core_types::Notice::KnowledgeBaseCreated { kb_id: "a".into() },
            core_types::Notice::KnowledgeBaseCreateFailed { name: "a".into() },
            core_types::Notice::DuplicateKnowledgeBase { name: "a".into() },
            core_types::Notice::NoKnowledgeBaseSelected,
            core_types::Notice::DocumentUploaded {
                file_name: "f".into(),
                kb_id: "a".into(),
            },
            core_types::Notice::DocumentUploadFailed {
                file_name: "f".into(),
                kb_id: "a".into(),
            },
            core_types::Notice::UnsupportedDocument {
                file_name: "f".into(),
            },
        ];
        for lang in [UiLanguage::ZhCn, UiLanguage::EnUs] {
            let i18n = I18n::new(lang);
            for notice in &notices {
                assert_ne!(i18n.t(notice.key()), notice.key());
            }
        }
    }
}
