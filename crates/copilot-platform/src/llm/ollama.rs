//! Ollama adapter.
//!
//! Chat, embeddings and model management against a local Ollama runtime.
//! Uses browser `fetch()` via gloo-net; streaming bodies are read through
//! the response's `ReadableStream`.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use futures::future::{self, Either};
use futures::stream::{self, Stream, StreamExt};
use gloo_net::http::{Request, RequestBuilder, Response};
use gloo_timers::future::TimeoutFuture;
use js_sys::{Reflect, Uint8Array};
use serde::Deserialize;
use serde_json::{json, Value};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

use copilot_core::ports::*;
use copilot_types::{
    config::LlmConfig,
    model::{ModelEntry, PullStatus},
    CopilotError, Result,
};

use super::ndjson::{self, ByteStream, LineStream};

type PullStream = Pin<Box<dyn Stream<Item = Result<PullStatus>>>>;

/// Client for one Ollama endpoint, serving both chat and embeddings.
pub struct OllamaClient {
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    fn timeout_ms(&self) -> u64 {
        self.config.request_timeout_ms()
    }
}

#[async_trait(?Send)]
impl ChatPort for OllamaClient {
    fn stream_chat(&self, req: ChatRequest) -> ChunkStream {
        let opened = open_lines(self.url("/api/chat"), chat_body(&req), self.timeout_ms());
        Box::pin(stream::once(opened).flat_map(|opened| -> ChunkStream {
            match opened {
                Ok(lines) => ndjson::chat_stream(lines),
                Err(e) => Box::pin(stream::iter(vec![LlmStreamEvent::Error(e.to_string())])),
            }
        }))
    }

    async fn list_models(&self) -> Result<Vec<ModelEntry>> {
        let response = with_timeout(send(Request::get(&self.url("/api/tags"))), self.timeout_ms()).await?;
        let data: TagsResponse = response
            .json()
            .await
            .map_err(|e| CopilotError::Llm(e.to_string()))?;
        Ok(data.models)
    }

    fn pull_model(&self, name: &str) -> PullStream {
        log::info!("pulling model {}", name);
        let body = json!({ "model": name, "stream": true });
        let opened = open_lines(self.url("/api/pull"), body, self.timeout_ms());
        Box::pin(stream::once(opened).flat_map(|opened| -> PullStream {
            match opened {
                Ok(lines) => Box::pin(lines.map(|line| line.and_then(|l| ndjson::pull_status(&l)))),
                Err(e) => Box::pin(stream::iter(vec![Err(e)])),
            }
        }))
    }

    async fn delete_model(&self, name: &str) -> Result<()> {
        let body = json!({ "model": name });
        with_timeout(
            send_json(Request::delete(&self.url("/api/delete")), &body),
            self.timeout_ms(),
        )
        .await?;
        log::info!("deleted model {}", name);
        Ok(())
    }
}

#[async_trait(?Send)]
impl EmbeddingPort for OllamaClient {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let response = with_timeout(
            send_json(Request::post(&self.url("/api/embed")), &embed_body(model, inputs)),
            self.timeout_ms(),
        )
        .await?;
        let data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CopilotError::Llm(e.to_string()))?;
        Ok(data.embeddings)
    }
}

// ─── Request / response bodies ───────────────────────────────

pub(crate) fn chat_body(req: &ChatRequest) -> Value {
    let messages: Vec<Value> = req
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();
    json!({
        "model": req.model,
        "messages": messages,
        "stream": true,
    })
}

pub(crate) fn embed_body(model: &str, inputs: &[String]) -> Value {
    json!({ "model": model, "input": inputs })
}

#[derive(Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
pub(crate) struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

// ─── Transport helpers ───────────────────────────────────────

pub(crate) fn net_err(e: gloo_net::Error) -> CopilotError {
    CopilotError::Network(e.to_string())
}

fn js_err(e: JsValue) -> CopilotError {
    CopilotError::JsInterop(format!("{:?}", e))
}

async fn send(builder: RequestBuilder) -> Result<Response> {
    let response = builder.send().await.map_err(net_err)?;
    check_status(response).await
}

async fn send_json(builder: RequestBuilder, body: &Value) -> Result<Response> {
    let response = builder
        .json(body)
        .map_err(net_err)?
        .send()
        .await
        .map_err(net_err)?;
    check_status(response).await
}

async fn check_status(response: Response) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(CopilotError::Llm(format!("HTTP {}: {}", status, text)))
}

/// Fail with `Timeout` when `fut` takes longer than `timeout_ms`.
pub(crate) async fn with_timeout<T, F>(fut: F, timeout_ms: u64) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let timer = TimeoutFuture::new(u32::try_from(timeout_ms).unwrap_or(u32::MAX));
    futures::pin_mut!(fut);
    futures::pin_mut!(timer);
    match future::select(fut, timer).await {
        Either::Left((result, _)) => result,
        Either::Right(_) => Err(CopilotError::Timeout(timeout_ms)),
    }
}

/// POST `body` to `url` and expose the streamed response as lines.
async fn open_lines(url: String, body: Value, timeout_ms: u64) -> Result<LineStream> {
    let response = with_timeout(send_json(Request::post(&url), &body), timeout_ms).await?;
    let body = response
        .body()
        .ok_or_else(|| CopilotError::Network(format!("{} returned no body", url)))?;
    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
    Ok(ndjson::lines(body_chunks(reader, timeout_ms)))
}

/// Each read is bounded by `timeout_ms`; a stalled runtime ends the stream
/// with `Timeout`.
fn body_chunks(reader: ReadableStreamDefaultReader, timeout_ms: u64) -> ByteStream {
    Box::pin(stream::unfold(Some(reader), move |reader| async move {
        let reader = reader?;
        match with_timeout(read_chunk(&reader), timeout_ms).await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some(reader))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    }))
}

async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>> {
    let result = JsFuture::from(reader.read()).await.map_err(js_err)?;
    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(js_err)?
        .as_bool()
        .unwrap_or(true);
    if done {
        return Ok(None);
    }
    let value = Reflect::get(&result, &JsValue::from_str("value")).map_err(js_err)?;
    Ok(Some(Uint8Array::new(&value).to_vec()))
}
