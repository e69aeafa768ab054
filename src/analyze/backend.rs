//! Text-generation backend: request type, provider abstraction and the
//! OpenAI-compatible HTTP client.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Local models can take many minutes on a full chunk.
pub const BACKEND_TIMEOUT: Duration = Duration::from_secs(900);

/// One completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Does the remote call. `Ok(None)` means the backend answered 200 with no
/// usable content; `Err` covers transport errors, non-200 and unreadable bodies.
pub trait Backend: Send + Sync {
    fn complete<'a>(
        &'a self,
        req: &'a AnalysisRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynBackend = Arc<dyn Backend>;

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMsg>,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

/// Pull `choices[0].message.content` out of a completion body.
pub fn extract_content(body: &str) -> Result<Option<String>> {
    let resp: Resp = serde_json::from_str(body).context("parsing backend reply")?;
    Ok(resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty()))
}

/// OpenAI-compatible chat completions client (LM Studio, llama.cpp server, ...).
pub struct HttpBackend {
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("feed-sentinel/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(BACKEND_TIMEOUT)
            .build()
            .context("building backend http client")?;
        Ok(Self { http })
    }
}

impl Backend for HttpBackend {
    fn complete<'a>(
        &'a self,
        req: &'a AnalysisRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move {
            let body = Req {
                model: &req.model,
                messages: vec![Msg {
                    role: "user",
                    content: &req.prompt,
                }],
                max_tokens: req.max_tokens,
            };

            let resp = self
                .http
                .post(&req.endpoint)
                .json(&body)
                .send()
                .await
                .context("backend request")?;

            let status = resp.status();
            if status != reqwest::StatusCode::OK {
                return Err(anyhow!("backend returned HTTP {}", status.as_u16()));
            }
            let text = resp.text().await.context("reading backend body")?;
            extract_content(&text)
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
