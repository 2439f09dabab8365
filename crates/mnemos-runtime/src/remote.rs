//! Remote-forwarding mode.
//!
//! [`RemoteClient`] is a plain request proxy: every record operation becomes
//! one JSON `POST <endpoint>/v1/agents/<name>/<operation>` and the reply body
//! is the operation's result.  A failing server answers
//! `{"error": <MnemosError>}`, which is surfaced unchanged.
//!
//! Agent lifecycle (`init`, `erase`, `list_agents`) is not forwarded; see
//! [`Client`][crate::client::Client].

use mnemos_memory::{RecallQuery, RecallResult};
use mnemos_types::{AgentName, Deadline, Fields, Record, RecordId, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http::{post_json, trim_base};
use crate::infer::{InferOptions, Inference};

// ─────────────────────────────────────────────────────────────────────────────
// Wire bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PairBody<'a> {
    input: &'a Fields,
    output: &'a Fields,
}

#[derive(Debug, Serialize)]
struct IdBody<'a> {
    id: &'a RecordId,
}

#[derive(Debug, Serialize)]
struct EditBody<'a> {
    id: &'a RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<&'a Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Fields>,
}

#[derive(Debug, Serialize)]
struct FindBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<&'a Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Fields>,
}

#[derive(Debug, Serialize)]
struct InferBody<'a> {
    input: &'a Fields,
    #[serde(flatten)]
    options: InferOptions,
}

#[derive(Debug, Deserialize)]
struct IdReply {
    id: RecordId,
}

#[derive(Debug, Deserialize)]
struct DeletedReply {
    deleted: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// RemoteClient
// ─────────────────────────────────────────────────────────────────────────────

pub struct RemoteClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    /// URL of `operation` on `agent`.
    pub fn url(&self, agent: &AgentName, operation: &str) -> String {
        format!("{}/v1/agents/{}/{operation}", self.base_url, agent.as_str())
    }

    async fn call<B, R>(&self, agent: &AgentName, operation: &str, body: &B, deadline: Deadline) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.url(agent, operation);
        post_json(&self.client, &url, self.api_key.as_deref(), body, "remote", deadline).await
    }

    pub async fn store(&self, agent: &AgentName, input: &Fields, output: &Fields, deadline: Deadline) -> Result<RecordId> {
        let reply: IdReply = self
            .call(agent, "store", &PairBody { input, output }, deadline)
            .await?;
        Ok(reply.id)
    }

    pub async fn reinforce(
        &self,
        agent: &AgentName,
        input: &Fields,
        output: &Fields,
        deadline: Deadline,
    ) -> Result<RecordId> {
        let reply: IdReply = self
            .call(agent, "reinforce", &PairBody { input, output }, deadline)
            .await?;
        Ok(reply.id)
    }

    pub async fn recall(&self, agent: &AgentName, query: &RecallQuery, deadline: Deadline) -> Result<RecallResult> {
        self.call(agent, "recall", query, deadline).await
    }

    pub async fn edit(
        &self,
        agent: &AgentName,
        id: &RecordId,
        input: Option<&Fields>,
        output: Option<&Fields>,
        deadline: Deadline,
    ) -> Result<Record> {
        self.call(agent, "edit", &EditBody { id, input, output }, deadline)
            .await
    }

    pub async fn delete(&self, agent: &AgentName, id: &RecordId, deadline: Deadline) -> Result<bool> {
        let reply: DeletedReply = self.call(agent, "delete", &IdBody { id }, deadline).await?;
        Ok(reply.deleted)
    }

    pub async fn get(&self, agent: &AgentName, id: &RecordId, deadline: Deadline) -> Result<Record> {
        self.call(agent, "get", &IdBody { id }, deadline).await
    }

    pub async fn find(
        &self,
        agent: &AgentName,
        input: Option<&Fields>,
        output: Option<&Fields>,
        deadline: Deadline,
    ) -> Result<Vec<Record>> {
        self.call(agent, "find", &FindBody { input, output }, deadline)
            .await
    }

    pub async fn infer(
        &self,
        agent: &AgentName,
        input: &Fields,
        options: &InferOptions,
        deadline: Deadline,
    ) -> Result<Inference> {
        let body = InferBody {
            input,
            options: options.clone(),
        };
        self.call(agent, "infer", &body, deadline).await
    }
}
