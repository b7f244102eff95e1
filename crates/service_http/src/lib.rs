use std::time::Duration;

use async_trait::async_trait;
use core_types::{ChatQuery, DocumentFile, KnowledgeBase, KnowledgeService, ServiceError};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const FILE_FIELD: &str = "file";
pub const KB_ID_FIELD: &str = "kb_id";

/// `KnowledgeService` over the JSON/multipart HTTP API.
pub struct HttpKnowledgeService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpKnowledgeService {
    /// Client without an implicit request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(transport_error)?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ListPayload {
    #[serde(default)]
    knowledge_bases: Option<Vec<KnowledgeBase>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePayload {
    #[serde(default)]
    kb_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl KnowledgeService for HttpKnowledgeService {
    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ServiceError> {
        let url = self.endpoint("/knowledge-bases");
        debug!(%url, "listing knowledge bases");
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let text = success_body(response).await?;

        let envelope: Envelope<ListPayload> = decode(&text)?;
        if let Some(error) = envelope.data.error {
            return Err(ServiceError::Payload(format!("service reported: {error}")));
        }
        envelope
            .data
            .knowledge_bases
            .ok_or_else(|| ServiceError::Payload("missing data.knowledge_bases".to_string()))
    }

    async fn create_knowledge_base(&self, kb_id: &str) -> Result<KnowledgeBase, ServiceError> {
        let url = self.endpoint("/knowledge-bases/");
        debug!(%url, kb_id, "creating knowledge base");
        let response = self
            .client
            .post(url)
            .json(&json!({ "kb_id": kb_id }))
            .send()
            .await
            .map_err(transport_error)?;
        let text = success_body(response).await?;

        let envelope: Envelope<CreatePayload> = decode(&text)?;
        if let Some(error) = envelope.data.error {
            return Err(ServiceError::Payload(format!("service reported: {error}")));
        }
        match envelope.data.kb_id {
            Some(id) if !id.trim().is_empty() => Ok(KnowledgeBase::new(id)),
            _ => Err(ServiceError::Payload("missing data.kb_id".to_string())),
        }
    }

    async fn upload_document(
        &self,
        knowledge_base: &KnowledgeBase,
        document: &DocumentFile,
    ) -> Result<(), ServiceError> {
        let url = self.endpoint("/knowledge-bases/upload");
        debug!(
            %url,
            kb_id = %knowledge_base,
            file = %document.file_name,
            bytes = document.bytes.len(),
            "uploading document"
        );
        let form = Form::new()
            .part(
                FILE_FIELD,
                Part::bytes(document.bytes.clone()).file_name(document.file_name.clone()),
            )
            .text(KB_ID_FIELD, knowledge_base.id.clone());
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        success_body(response).await?;
        Ok(())
    }

    async fn query(&self, query: &ChatQuery) -> Result<String, ServiceError> {
        let url = self.endpoint("/chat/query");
        debug!(%url, kb_id = %query.kb_id, "querying knowledge base");
        let response = self
            .client
            .post(url)
            .json(query)
            .send()
            .await
            .map_err(transport_error)?;
        let text = success_body(response).await?;

        let body: Value = decode(&text)?;
        extract_reply(&body)
            .ok_or_else(|| ServiceError::Payload("missing reply at data.response".to_string()))
    }
}

/// Reply text at `data.response`: either a plain string, or an agent transcript
/// whose last message carries string `content`. Blank replies count as missing.
pub fn extract_reply(body: &Value) -> Option<String> {
    let response = body.get("data")?.get("response")?;
    let text = match response {
        Value::String(text) => text.as_str(),
        Value::Object(_) => response
            .get("messages")?
            .as_array()?
            .last()?
            .get("content")?
            .as_str()?,
        _ => return None,
    };
    if text.trim().is_empty() {
        return None;
    }
    Some(text.to_owned())
}

async fn success_body(response: reqwest::Response) -> Result<String, ServiceError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;
    if !status.is_success() {
        warn!(%status, "knowledge service request failed");
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ServiceError> {
    serde_json::from_str(text).map_err(|err| ServiceError::Payload(err.to_string()))
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.to_string())
}
