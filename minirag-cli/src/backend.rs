//! Construction of the pipeline and its backends from command-line options.

use std::sync::Arc;

use anyhow::{Context, Result};
use minirag::ollama::{self, OllamaEmbeddingProvider, OllamaGenerator};
use minirag::openai::{OpenAICompletionGenerator, OpenAIEmbeddingProvider};
use minirag::{EmbeddingProvider, HashingEmbeddingProvider, RagConfig, RagPipeline, TextGenerator};
use tracing::debug;

use crate::cli::{EmbedderKind, GeneratorKind, GlobalOptions};

/// Load the config file (if any) and apply command-line overrides.
pub fn load_config(options: &GlobalOptions) -> Result<RagConfig> {
    let mut config = match &options.config {
        Some(path) => RagConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RagConfig::default(),
    };

    if let Some(dir) = &options.index_dir {
        config.index_dir = dir.clone();
    }
    if let Some(k) = options.top_k {
        config.top_k = k;
    }
    config.validate().context("invalid configuration")?;

    debug!(?config, "resolved configuration");
    Ok(config)
}

/// The embedding provider selected by `--embedder`.
pub fn embedding_provider(options: &GlobalOptions) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match options.embedder {
        EmbedderKind::Hashing => {
            let dimensions = options
                .embedding_dimensions
                .unwrap_or(HashingEmbeddingProvider::DEFAULT_DIMENSIONS);
            Arc::new(HashingEmbeddingProvider::new(dimensions)?)
        }
        EmbedderKind::Ollama => {
            let mut provider = OllamaEmbeddingProvider::new(&options.ollama_url);
            if options.embedding_model.is_some() || options.embedding_dimensions.is_some() {
                let model =
                    options.embedding_model.as_deref().unwrap_or(ollama::DEFAULT_EMBEDDING_MODEL);
                let dimensions =
                    options.embedding_dimensions.unwrap_or(ollama::DEFAULT_EMBEDDING_DIMENSIONS);
                provider = provider.with_model(model, dimensions);
            }
            Arc::new(provider)
        }
        EmbedderKind::Openai => {
            let mut provider =
                OpenAIEmbeddingProvider::new(&options.openai_url, options.openai_api_key.clone());
            if let Some(model) = &options.embedding_model {
                provider = provider.with_model(model);
            }
            if let Some(dimensions) = options.embedding_dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Arc::new(provider)
        }
    };
    Ok(provider)
}

/// The text generator selected by `--generator`.
pub fn generator(options: &GlobalOptions) -> Arc<dyn TextGenerator> {
    match options.generator {
        GeneratorKind::Ollama => {
            let mut generator = OllamaGenerator::new(&options.ollama_url);
            if let Some(model) = &options.generation_model {
                generator = generator.with_model(model);
            }
            Arc::new(generator)
        }
        GeneratorKind::Openai => {
            let mut generator =
                OpenAICompletionGenerator::new(&options.openai_url, options.openai_api_key.clone());
            if let Some(model) = &options.generation_model {
                generator = generator.with_model(model);
            }
            Arc::new(generator)
        }
    }
}

/// Assemble a [`RagPipeline`] from the global options.
pub fn build_pipeline(options: &GlobalOptions) -> Result<RagPipeline> {
    let config = load_config(options)?;
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedding_provider(options)?)
        .generator(generator(options))
        .build()
        .context("failed to build pipeline")?;
    Ok(pipeline)
}
