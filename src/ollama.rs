//! Ollama generation backend.
//!
//! Calls `POST <url>/api/generate` with
//! `{"model", "prompt", "stream", "options": {"num_ctx"}}`. History is folded
//! into the prompt through the configured [`HistoryWindow`].
//!
//! Non-streaming requests read the `response` field of a single JSON object.
//! Streaming requests read newline-delimited JSON objects, yielding each
//! non-empty `response` until one arrives with `"done": true`.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use debator_core::generation::{
    FragmentStream, GenerationBackend, GenerationError, HistoryWindow,
};
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::config::GenerationConfig;

pub struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    num_ctx: u32,
    window: HistoryWindow,
}

impl OllamaBackend {
    pub fn new(model: &str, config: &GenerationConfig, window: HistoryWindow) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            num_ctx: config.num_ctx,
            window,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.url)
    }

    fn request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": stream,
            "options": { "num_ctx": self.num_ctx },
        })
    }
}

fn request_error(e: reqwest::Error) -> GenerationError {
    GenerationError::Request(e.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::Status {
        status: status.as_u16(),
        body,
    })
}

/// One object of an `/api/generate` response (whole or streamed).
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
    /// Nanoseconds.
    #[serde(default)]
    eval_duration: Option<u64>,
}

impl GenerateChunk {
    fn parse(raw: &[u8]) -> Result<Self, GenerationError> {
        serde_json::from_slice(raw).map_err(|e| GenerationError::Decode(e.to_string()))
    }

    fn log_metrics(&self, model: &str) {
        if let Some(eval_count) = self.eval_count {
            let secs = self.eval_duration.unwrap_or(1) as f64 / 1e9;
            let tokens_per_sec = eval_count as f64 / secs.max(0.001);
            tracing::debug!(
                model,
                eval_count,
                tokens_per_sec = (tokens_per_sec * 10.0).round() / 10.0,
                "generation metrics"
            );
        }
    }
}

/// Extract the reply from a complete (non-streaming) response.
fn parse_generate_response(raw: &[u8], model: &str) -> Result<String, GenerationError> {
    let chunk = GenerateChunk::parse(raw)?;
    if let Some(error) = chunk.error {
        return Err(GenerationError::Backend(error));
    }
    chunk.log_metrics(model);
    chunk
        .response
        .ok_or_else(|| GenerationError::Decode("missing `response` field".to_string()))
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, history: &[String]) -> Result<String, GenerationError> {
        let full_prompt = self.window.fold(prompt, history);
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(&full_prompt, false))
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;
        let raw = response.bytes().await.map_err(request_error)?;
        parse_generate_response(&raw, &self.model)
    }

    fn generate_stream<'a>(&'a self, prompt: String, history: &'a [String]) -> FragmentStream<'a> {
        let full_prompt = self.window.fold(&prompt, history);
        let request = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(&full_prompt, true));
        let model = self.model.clone();

        Box::pin(
            futures::stream::once(async move {
                let response = request.send().await.map_err(request_error)?;
                let response = check_status(response).await?;
                Ok::<_, GenerationError>(ndjson_fragments(
                    Box::pin(response.bytes_stream()),
                    model,
                ))
            })
            .try_flatten(),
        )
    }
}

/// Splits a byte stream into lines, tolerating lines split across reads.
#[derive(Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(line);
        }
        lines
    }

    fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

struct NdjsonState<S> {
    bytes: S,
    lines: LineBuffer,
    pending: VecDeque<Result<String, GenerationError>>,
    finished: bool,
    model: String,
}

impl<S> NdjsonState<S> {
    fn handle_line(&mut self, line: &[u8]) {
        if self.finished || line.iter().all(|b| b.is_ascii_whitespace()) {
            return;
        }
        match GenerateChunk::parse(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error.clone() {
                    self.fail(GenerationError::Backend(error));
                    return;
                }
                if let Some(text) = chunk.response.as_deref().filter(|t| !t.is_empty()) {
                    self.pending.push_back(Ok(text.to_string()));
                }
                if chunk.done {
                    chunk.log_metrics(&self.model);
                    self.finished = true;
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: GenerationError) {
        self.pending.push_back(Err(error));
        self.finished = true;
    }
}

/// Decode an NDJSON `/api/generate` byte stream into text fragments.
fn ndjson_fragments<S, B, E>(
    bytes: S,
    model: String,
) -> impl Stream<Item = Result<String, GenerationError>> + Send
where
    S: Stream<Item = Result<B, E>> + Unpin + Send,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = NdjsonState {
        bytes,
        lines: LineBuffer::default(),
        pending: VecDeque::new(),
        finished: false,
        model,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for line in state.lines.push(chunk.as_ref()) {
                        state.handle_line(&line);
                    }
                }
                Some(Err(e)) => state.fail(GenerationError::Request(e.to_string())),
                None => {
                    if let Some(line) = state.lines.finish() {
                        state.handle_line(&line);
                    }
                    state.finished = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_stream(
        parts: &[&str],
    ) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Unpin + Send {
        let items: Vec<Result<Vec<u8>, std::io::Error>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        futures::stream::iter(items)
    }

    async fn collect(parts: &[&str]) -> Vec<Result<String, GenerationError>> {
        ndjson_fragments(byte_stream(parts), "test".to_string())
            .collect()
            .await
    }

    #[test]
    fn test_parse_complete_response() {
        let raw = br#"{"model":"llama3:8b","response":"Cells divide [p.2].","done":true,"eval_count":12,"eval_duration":400000000}"#;
        assert_eq!(
            parse_generate_response(raw, "llama3:8b").unwrap(),
            "Cells divide [p.2]."
        );
    }

    #[test]
    fn test_parse_error_response() {
        let raw = br#"{"error":"model 'nope' not found"}"#;
        let err = parse_generate_response(raw, "nope").unwrap_err();
        assert!(matches!(err, GenerationError::Backend(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_parse_malformed_response() {
        assert!(matches!(
            parse_generate_response(b"not json", "m"),
            Err(GenerationError::Decode(_))
        ));
        assert!(matches!(
            parse_generate_response(br#"{"done":true}"#, "m"),
            Err(GenerationError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_fragments_in_order() {
        let items = collect(&[
            "{\"response\":\"Cells\",\"done\":false}\n{\"response\":\" divide\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true,\"eval_count\":2,\"eval_duration\":1000}\n",
        ])
        .await;
        let text: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text, vec!["Cells", " divide"]);
    }

    #[tokio::test]
    async fn test_stream_line_split_across_reads() {
        let items = collect(&[
            "{\"respo",
            "nse\":\"hel",
            "lo\",\"done\":false}\n{\"response\":\"!\",\"done\":true}",
        ])
        .await;
        let text: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text.concat(), "hello!");
    }

    #[tokio::test]
    async fn test_stream_stops_at_done() {
        let items = collect(&[
            "{\"response\":\"a\",\"done\":true}\n{\"response\":\"ignored\",\"done\":false}\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_object_ends_stream() {
        let items = collect(&[
            "{\"response\":\"partial\",\"done\":false}\n{\"error\":\"out of memory\"}\n{\"response\":\"x\"}\n",
        ])
        .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(GenerationError::Backend(m)) if m == "out of memory"));
    }

    #[tokio::test]
    async fn test_stream_malformed_line() {
        let items = collect(&["garbage\n"]).await;
        assert!(matches!(items.as_slice(), [Err(GenerationError::Decode(_))]));
    }

    #[test]
    fn test_request_body() {
        let config = GenerationConfig::default();
        let backend = OllamaBackend::new("llama3:8b", &config, HistoryWindow::default()).unwrap();
        let body = backend.request_body("hi", true);
        assert_eq!(body["model"], "llama3:8b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["num_ctx"], 4096);
        assert_eq!(backend.endpoint(), "http://localhost:11434/api/generate");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        let config = GenerationConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };
        let backend = OllamaBackend::new("m", &config, HistoryWindow::default()).unwrap();
        let err = backend.generate("hi", &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::Request(_)));
    }
}
