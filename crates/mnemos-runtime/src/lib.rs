//! `mnemos-runtime` – providers, inference and process plumbing.
//!
//! Everything in mnemos that leaves the process lives here.
//!
//! # Modules
//!
//! - [`embedder`] – [`HttpEmbedder`][embedder::HttpEmbedder]: an
//!   OpenAI-compatible `/v1/embeddings` client implementing
//!   [`Embedder`][mnemos_memory::Embedder].
//! - [`llm_driver`] – the [`Generator`][llm_driver::Generator] seam,
//!   [`LlmDriver`][llm_driver::LlmDriver] (OpenAI-compatible
//!   `/v1/chat/completions`) and [`ProviderRouter`][llm_driver::ProviderRouter],
//!   which picks a backend by requested model id.
//! - [`infer`] – prompt composition and the generate → decode round trip.
//! - [`remote`] – [`RemoteClient`][remote::RemoteClient]: the
//!   remote-forwarding proxy.
//! - [`client`] – [`Client`][client::Client] / [`Mode`][client::Mode]: one
//!   facade over local and remote operation.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with optional OTLP export.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to forward spans to any OTLP collector.

pub mod client;
pub mod embedder;
mod http;
pub mod infer;
pub mod llm_driver;
pub mod remote;
pub mod telemetry;

pub use client::{Client, Mode};
pub use embedder::HttpEmbedder;
pub use infer::{INSTRUCTIONS, InferOptions, Inference, compose_prompt, infer};
pub use llm_driver::{ChatMessage, Generator, LlmDriver, ProviderRouter, Role, model_matches};
pub use remote::RemoteClient;
pub use telemetry::{LogSettings, TracerProviderGuard, init_tracing};
