//! Prompt templates for topic-focused chunk analysis and the bulk trend report.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const CHUNK_KEY: &str = "CHUNK";
pub const TOPICS_KEY: &str = "TOPICS";

const DEFAULT_TEMPLATE: &str = "You are monitoring incoming news and alert feeds for an operator.\n\
Topics of interest: {TOPICS}\n\n\
Report only items that clearly relate to the topics above, one short paragraph each, \
with the item's link. If nothing is relevant, reply with an empty message.\n\n\
FEED ITEMS:\n{CHUNK}";

const BULK_PREAMBLE: &str = "You are analyzing an accumulation of RSS and social media text. \
Produce a structured trend report summarizing major themes, emerging risks, and patterns \
based solely on matching or linked (yet disparate) information in the data feed. \
If there are no patterns that can be pieced together, don't create fake connections just \
to provide an answer. Do not quote the input.\n\nINPUT DATA:\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    UnknownPlaceholder(String),
    UnbalancedBrace(usize),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UnknownPlaceholder(k) => write!(f, "unknown placeholder {{{k}}}"),
            TemplateError::UnbalancedBrace(pos) => write!(f, "unbalanced brace at char {pos}"),
        }
    }
}

impl std::error::Error for TemplateError {}

/// User-supplied prompt with `{CHUNK}` and `{TOPICS}` placeholders.
/// Literal braces are written `{{` and `}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
    source: Option<PathBuf>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading prompt file {}", path.display()))?;
        Ok(Self {
            text,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn mentions_chunk(&self) -> bool {
        self.text.contains("{CHUNK}")
    }

    pub fn render(&self, chunk: &str, topics: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.text.len() + chunk.len() + topics.len());
        let mut chars = self.text.chars().enumerate().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        out.push('{');
                        continue;
                    }
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => return Err(TemplateError::UnbalancedBrace(pos)),
                            Some((_, k)) => key.push(k),
                        }
                    }
                    match key.as_str() {
                        CHUNK_KEY => out.push_str(chunk),
                        TOPICS_KEY => out.push_str(topics),
                        _ => return Err(TemplateError::UnknownPlaceholder(key)),
                    }
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        out.push('}');
                    } else {
                        return Err(TemplateError::UnbalancedBrace(pos));
                    }
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}

/// Comma-joined topic list as shown to the backend.
pub fn topics_string(topics: &[String]) -> String {
    let cleaned: Vec<&str> = topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if cleaned.is_empty() {
        "No topics defined".to_string()
    } else {
        cleaned.join(", ")
    }
}

/// Fixed trend-report prompt over the rolling corpus.
pub fn bulk_prompt(corpus: &str) -> String {
    format!("{BULK_PREAMBLE}{corpus}")
}
