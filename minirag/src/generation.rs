//! Answer generation from a question and retrieved context.
//!
//! [`AnswerGenerator`] owns the prompt template and the post-processing of
//! model output; the model itself sits behind the [`TextGenerator`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::DEFAULT_MAX_NEW_TOKENS;
use crate::error::{RagError, Result};

/// A text-generation backend: prompt in, text out.
///
/// Some backends return only the continuation, others the prompt followed by
/// the continuation; [`AnswerGenerator`] handles both.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate up to `max_new_tokens` tokens continuing `prompt`.
    async fn generate_text(&self, prompt: &str, max_new_tokens: usize) -> Result<String>;

    /// Identify the backend and model, e.g. `ollama/llama3.2`.
    fn name(&self) -> &str;
}

/// Settings applied to every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Token budget per answer.
    pub max_new_tokens: usize,
    /// The answer is cut at the first occurrence of any of these.
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            stop_sequences: vec!["\nQuestion:".to_string(), "Context:".to_string()],
        }
    }
}

/// Build the prompt for `query` over `context`.
///
/// The context is inserted verbatim; it must already fit within the model's
/// context window, as nothing here truncates it.
pub fn compose_prompt(query: &str, context: &str) -> String {
    format!("Context: {context}\n\nQuestion: {query}{ANSWER_CUE}")
}

const ANSWER_CUE: &str = "\nAnswer:";

/// Composes prompts, calls a [`TextGenerator`] once, and cleans the output.
///
/// # Example
///
/// ```rust,ignore
/// let backend = Arc::new(OllamaGenerator::new(DEFAULT_OLLAMA_URL));
/// let generator = AnswerGenerator::new(backend, GenerationConfig::default());
/// let answer = generator.generate("What is discussed?", &context).await?;
/// ```
pub struct AnswerGenerator {
    backend: Arc<dyn TextGenerator>,
    config: GenerationConfig,
}

impl AnswerGenerator {
    /// Create an answer generator over `backend`.
    pub fn new(backend: Arc<dyn TextGenerator>, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    /// The generation settings.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Answer `query` using `context`.
    ///
    /// Makes exactly one backend call. The returned text never includes the
    /// echoed prompt and stops before any stop sequence.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationFailure`] if the backend fails or the
    /// cleaned answer is empty.
    pub async fn generate(&self, query: &str, context: &str) -> Result<String> {
        let prompt = compose_prompt(query, context);
        debug!(
            backend = self.backend.name(),
            prompt_len = prompt.len(),
            max_new_tokens = self.config.max_new_tokens,
            "generating answer"
        );

        let output = self.backend.generate_text(&prompt, self.config.max_new_tokens).await.map_err(
            |e| {
                error!(backend = self.backend.name(), error = %e, "generation failed");
                match e {
                    RagError::GenerationFailure { .. } => e,
                    other => RagError::GenerationFailure {
                        provider: self.backend.name().to_string(),
                        message: other.to_string(),
                    },
                }
            },
        )?;

        let answer = clean_output(&output, &prompt, query, &self.config.stop_sequences);
        if answer.is_empty() {
            error!(backend = self.backend.name(), "backend returned an empty answer");
            return Err(RagError::GenerationFailure {
                provider: self.backend.name().to_string(),
                message: "model returned an empty answer".to_string(),
            });
        }

        info!(backend = self.backend.name(), answer_len = answer.len(), "generated answer");
        Ok(answer)
    }
}

/// Strip an echoed prompt, cut at the first stop sequence, and trim.
fn clean_output(output: &str, prompt: &str, query: &str, stop_sequences: &[String]) -> String {
    let continuation = strip_echo(output, prompt, query);
    let cut = stop_sequences
        .iter()
        .filter(|stop| !stop.is_empty())
        .filter_map(|stop| continuation.find(stop.as_str()))
        .min()
        .unwrap_or(continuation.len());
    continuation[..cut].trim().to_string()
}

/// The part of `output` after the echoed prompt, if there is one.
///
/// Backends that decode the prompt back from tokens may not echo it
/// byte-for-byte (collapsed whitespace, tokenizer clean-up), so an echo is
/// also recognised by its closing `Question: {query}\nAnswer:` lines, or by
/// a leading `Context:` followed by an answer cue.
fn strip_echo<'a>(output: &'a str, prompt: &str, query: &str) -> &'a str {
    if let Some(rest) = output.strip_prefix(prompt) {
        return rest;
    }
    let tail = format!("Question: {query}{ANSWER_CUE}");
    if let Some(pos) = output.find(&tail) {
        return &output[pos + tail.len()..];
    }
    if output.trim_start().starts_with("Context:") {
        if let Some(pos) = output.rfind(ANSWER_CUE) {
            return &output[pos + ANSWER_CUE.len()..];
        }
    }
    output
}
