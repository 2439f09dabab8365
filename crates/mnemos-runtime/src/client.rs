//! [`Client`] – one entry point over local and remote operation.
//!
//! In [`Mode::Local`] every call runs against the embedded store and the
//! configured generator.  In [`Mode::Remote`] record operations are
//! forwarded by [`RemoteClient`]; agent lifecycle calls (`init`, `erase`,
//! `list_agents`) only make sense next to the database and fail with
//! [`MnemosError::InvalidMode`].

use std::fmt;
use std::sync::Arc;

use mnemos_memory::{AgentInfo, Memory, RecallQuery, RecallResult};
use mnemos_types::{AgentName, Deadline, Fields, MnemosError, Record, RecordId, RecordSchema, Result};
use serde::{Deserialize, Serialize};

use crate::infer::{InferOptions, Inference, infer};
use crate::llm_driver::Generator;
use crate::remote::RemoteClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Local,
    Remote,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Local => "local",
            Mode::Remote => "remote",
        })
    }
}

enum Backend {
    Local {
        memory: Memory,
        generator: Arc<dyn Generator>,
    },
    Remote(RemoteClient),
}

pub struct Client {
    backend: Backend,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backend {
            Backend::Local { memory, .. } => f.debug_tuple("Client::Local").field(memory).finish(),
            Backend::Remote(remote) => f.debug_tuple("Client::Remote").field(remote).finish(),
        }
    }
}

impl Client {
    pub fn local(memory: Memory, generator: Arc<dyn Generator>) -> Self {
        Self {
            backend: Backend::Local { memory, generator },
        }
    }

    pub fn remote(remote: RemoteClient) -> Self {
        Self {
            backend: Backend::Remote(remote),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.backend {
            Backend::Local { .. } => Mode::Local,
            Backend::Remote(_) => Mode::Remote,
        }
    }

    fn local_only(&self, operation: &str) -> Result<&Memory> {
        match &self.backend {
            Backend::Local { memory, .. } => Ok(memory),
            Backend::Remote(_) => Err(MnemosError::InvalidMode {
                operation: operation.to_string(),
                mode: Mode::Remote.to_string(),
            }),
        }
    }

    // ── agent lifecycle (local only) ─────────────────────────────────────────

    pub fn init(&self, agent: &AgentName, input: &RecordSchema, output: &RecordSchema) -> Result<AgentInfo> {
        Ok(self.local_only("init")?.init(agent, input, output)?.info())
    }

    pub fn erase(&self, agent: &AgentName) -> Result<bool> {
        self.local_only("erase")?.erase(agent)
    }

    pub fn list_agents(&self) -> Result<Vec<AgentInfo>> {
        self.local_only("list_agents")?.list_agents()
    }

    // ── record operations ────────────────────────────────────────────────────

    pub async fn store(&self, agent: &AgentName, input: &Fields, output: &Fields, deadline: Deadline) -> Result<RecordId> {
        match &self.backend {
            Backend::Local { memory, .. } => memory.open(agent)?.store(input, output),
            Backend::Remote(remote) => remote.store(agent, input, output, deadline).await,
        }
    }

    pub async fn reinforce(
        &self,
        agent: &AgentName,
        input: &Fields,
        output: &Fields,
        deadline: Deadline,
    ) -> Result<RecordId> {
        match &self.backend {
            Backend::Local { memory, .. } => {
                memory.open(agent)?
                    .reinforce(input, output, deadline)
                    .await
            }
            Backend::Remote(remote) => remote.reinforce(agent, input, output, deadline).await,
        }
    }

    pub async fn recall(&self, agent: &AgentName, query: &RecallQuery, deadline: Deadline) -> Result<RecallResult> {
        match &self.backend {
            Backend::Local { memory, .. } => memory.open(agent)?.recall(query, deadline).await,
            Backend::Remote(remote) => remote.recall(agent, query, deadline).await,
        }
    }

    pub async fn edit(
        &self,
        agent: &AgentName,
        id: &RecordId,
        input: Option<&Fields>,
        output: Option<&Fields>,
        deadline: Deadline,
    ) -> Result<Record> {
        match &self.backend {
            Backend::Local { memory, .. } => {
                memory.open(agent)?
                    .edit(id, input, output, deadline)
                    .await
            }
            Backend::Remote(remote) => remote.edit(agent, id, input, output, deadline).await,
        }
    }

    pub async fn delete(&self, agent: &AgentName, id: &RecordId, deadline: Deadline) -> Result<bool> {
        match &self.backend {
            Backend::Local { memory, .. } => memory.open(agent)?.delete(id),
            Backend::Remote(remote) => remote.delete(agent, id, deadline).await,
        }
    }

    pub async fn get(&self, agent: &AgentName, id: &RecordId, deadline: Deadline) -> Result<Record> {
        match &self.backend {
            Backend::Local { memory, .. } => memory.open(agent)?.get(id),
            Backend::Remote(remote) => remote.get(agent, id, deadline).await,
        }
    }

    pub async fn find(
        &self,
        agent: &AgentName,
        input: Option<&Fields>,
        output: Option<&Fields>,
        deadline: Deadline,
    ) -> Result<Vec<Record>> {
        match &self.backend {
            Backend::Local { memory, .. } => memory.open(agent)?.find(input, output),
            Backend::Remote(remote) => remote.find(agent, input, output, deadline).await,
        }
    }

    pub async fn infer(
        &self,
        agent: &AgentName,
        input: &Fields,
        options: &InferOptions,
        deadline: Deadline,
    ) -> Result<Inference> {
        match &self.backend {
            Backend::Local { memory, generator } => {
                let agent = memory.open(agent)?;
                infer(&agent, generator.as_ref(), input, options, deadline).await
            }
            Backend::Remote(remote) => remote.infer(agent, input, options, deadline).await,
        }
    }
}
