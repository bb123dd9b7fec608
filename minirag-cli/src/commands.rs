//! Subcommand implementations.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use minirag::{Answer, RagPipeline, VectorIndex};
use tracing::info;

use crate::cli::AnswerArgs;

/// Maximum characters of each source chunk shown by `--show-sources`.
const SOURCE_PREVIEW_CHARS: usize = 160;

/// Index `file`, replacing whatever was indexed before.
pub async fn ingest(pipeline: &RagPipeline, file: &Path, out: &mut impl Write) -> Result<()> {
    let index = pipeline
        .ingest_file(file)
        .await
        .with_context(|| format!("failed to index {}", file.display()))?;

    writeln!(
        out,
        "Indexed {} ({} chunks) into {}",
        file.display(),
        index.len(),
        VectorIndex::index_file(pipeline.index_dir()).display()
    )?;
    Ok(())
}

/// Answer `question`, optionally indexing `args.file` first.
pub async fn ask(
    pipeline: &RagPipeline,
    question: &str,
    args: &AnswerArgs,
    out: &mut impl Write,
) -> Result<Answer> {
    if let Some(file) = &args.file {
        pipeline
            .ingest_file(file)
            .await
            .with_context(|| format!("failed to index {}", file.display()))?;
    }

    let answer = pipeline.ask(question).await.context("failed to answer the question")?;
    writeln!(out, "{}", answer.text)?;

    if args.show_sources {
        writeln!(out)?;
        for (rank, source) in answer.sources.iter().enumerate() {
            writeln!(
                out,
                "[{}] distance {:.4}: {}",
                rank + 1,
                source.distance,
                preview(&source.chunk.text)
            )?;
        }
    }

    if let Some(path) = &args.output {
        std::fs::write(path, &answer.text)
            .with_context(|| format!("failed to write answer to {}", path.display()))?;
        info!(path = %path.display(), "saved answer");
    }

    Ok(answer)
}

/// Whitespace-collapsed prefix of a chunk for display.
fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(SOURCE_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use minirag::{HashingEmbeddingProvider, RagConfig, RagError, TextGenerator};

    use super::*;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate_text(
            &self,
            _prompt: &str,
            _max_new_tokens: usize,
        ) -> minirag::Result<String> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn pipeline(index_dir: &Path, reply: &'static str) -> RagPipeline {
        RagPipeline::builder()
            .config(RagConfig::builder().index_dir(index_dir).build().unwrap())
            .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
            .generator(Arc::new(FixedGenerator(reply)))
            .build()
            .unwrap()
    }

    fn write_document(dir: &Path) -> std::path::PathBuf {
        let file = dir.join("codes.txt");
        std::fs::write(
            &file,
            "F33.4 Recurrent depressive disorder, currently in remission.\n\n\
             F32.0 Mild depressive episode.",
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn ingest_reports_chunks_and_location() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_document(dir.path());
        let store = dir.path().join("vector_store");
        let mut out = Vec::new();

        ingest(&pipeline(&store, "unused"), &file, &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("(1 chunks)"), "{printed}");
        assert!(printed.contains("index.json"));
        assert!(store.join("index.json").exists());
    }

    #[tokio::test]
    async fn ask_prints_and_saves_the_answer() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("answer.txt");
        let args = AnswerArgs {
            file: Some(write_document(dir.path())),
            output: Some(output.clone()),
            show_sources: true,
        };
        let pipeline = pipeline(&dir.path().join("vector_store"), " F33.4\nQuestion: more");
        let mut out = Vec::new();

        let answer = ask(&pipeline, "Which code?", &args, &mut out).await.unwrap();

        assert_eq!(answer.text, "F33.4");
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "F33.4");
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with("F33.4\n"));
        assert!(printed.contains("[1] distance"));
    }

    #[tokio::test]
    async fn ask_without_an_index_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir.path().join("empty"), "unused");
        let err = ask(&pipeline, "Which code?", &AnswerArgs::default(), &mut Vec::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to answer"));
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn previews_are_flattened_and_bounded() {
        assert_eq!(preview("a\n\nb   c"), "a b c");
        let long = "x".repeat(SOURCE_PREVIEW_CHARS + 10);
        assert_eq!(preview(&long).chars().count(), SOURCE_PREVIEW_CHARS + 3);
    }
}
