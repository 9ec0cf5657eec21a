use crate::embeddings::Embedder;
use crate::error::{AnswerError, IndexError};
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::models::{PdfStats, SearchHit};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 15;

const GREETINGS: [&str; 5] = ["hi", "hello", "hey", "how are you?", "how are you"];

pub const GREETING_REPLY: &str =
    "I\u{2019}m doing well \u{1F60A} Thanks for asking! How can I help with your PDFs?";

const SYSTEM_PROMPT: &str = "\
You are a helpful assistant for a personal library of PDF documents.
You can reply conversationally, and you also have data extracted from the PDFs.
- Use PDF_STATS for questions about which files exist and their page and word counts.
- Use the retrieved context passages for detailed answers.
- If the context does not contain the answer, say \"I don't know\".";

pub fn is_greeting(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();
    GREETINGS.contains(&normalized.as_str())
}

/// One `<file> — <pages> pages, <words> words` line per file.
pub fn format_stats(stats: &[PdfStats]) -> String {
    stats
        .iter()
        .map(|entry| {
            format!(
                "{} \u{2014} {} pages, {} words",
                entry.filename, entry.pages, entry.words
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("[{} - p{}]: {}", hit.chunk.source, hit.chunk.page, hit.chunk.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn compose_prompt(stats: &[PdfStats], hits: &[SearchHit], query: &str) -> String {
    format!(
        "\n{SYSTEM_PROMPT}\n\nPDF_STATS:\n{}\n\nContext:\n{}\n\nUser Question: {query}\nAnswer:\n",
        format_stats(stats),
        format_context(hits),
    )
}

/// Retrieval-augmented answering over a built index.
pub struct AnswerEngine {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl AnswerEngine {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            embedder,
            generator,
            top_k,
        }
    }

    pub async fn retrieve(&self, index: &VectorIndex, query: &str) -> Result<Vec<SearchHit>, AnswerError> {
        let query_vector = self.embedder.embed(query).await.map_err(IndexError::from)?;
        Ok(index.search(&query_vector, self.top_k)?)
    }

    /// Greetings get a canned reply; anything else goes through retrieval and generation.
    pub async fn answer(
        &self,
        index: &VectorIndex,
        stats: &[PdfStats],
        query: &str,
    ) -> Result<String, AnswerError> {
        if is_greeting(query) {
            return Ok(GREETING_REPLY.to_string());
        }

        let hits = self.retrieve(index, query).await?;
        let prompt = compose_prompt(stats, &hits, query);
        debug!(hits = hits.len(), prompt_chars = prompt.len(), "prompting generator");

        Ok(self.generator.generate(&prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ModelError;
    use crate::models::PdfChunk;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        inner: CharacterNgramEmbedder,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.embed_text(text))
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("generated answer".to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            Err(ModelError::EmptyOutput("offline".to_string()))
        }
    }

    fn chunk(source: &str, page: u32, text: &str) -> PdfChunk {
        PdfChunk {
            source: source.to_string(),
            page,
            words: crate::models::count_words(text),
            total_pages: 2,
            total_words: 5,
            chunk_index: 0,
            char_offset: 0,
            text: text.to_string(),
        }
    }

    fn stats() -> Vec<PdfStats> {
        vec![PdfStats {
            filename: "doc.pdf".to_string(),
            pages: 2,
            words: 5,
        }]
    }

    async fn index_with(embedder: &dyn Embedder) -> VectorIndex {
        VectorIndex::build(
            vec![chunk("doc.pdf", 1, "Hello world"), chunk("doc.pdf", 2, "Foo bar baz")],
            embedder,
            "fp",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn greetings_skip_retrieval_and_generation() {
        let embedder = Arc::new(CountingEmbedder::default());
        let generator = Arc::new(RecordingGenerator::default());
        let index = index_with(embedder.as_ref()).await;
        let before = embedder.calls.load(Ordering::SeqCst);
        let engine = AnswerEngine::new(embedder.clone(), generator.clone(), DEFAULT_TOP_K);

        for query in ["hi", "HELLO", "Hey", "How are you?", "how ARE you", "  hi  "] {
            let reply = engine.answer(&index, &stats(), query).await.unwrap();
            assert_eq!(reply, GREETING_REPLY);
        }

        assert_eq!(embedder.calls.load(Ordering::SeqCst), before);
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn near_greetings_are_questions() {
        assert!(!is_greeting("hi there"));
        assert!(!is_greeting("hello, what is in doc.pdf?"));
    }

    #[tokio::test]
    async fn questions_are_answered_from_the_prompt() {
        let embedder = Arc::new(CountingEmbedder::default());
        let generator = Arc::new(RecordingGenerator::default());
        let index = index_with(embedder.as_ref()).await;
        let engine = AnswerEngine::new(embedder, generator.clone(), DEFAULT_TOP_K);

        let reply = engine.answer(&index, &stats(), "what says foo?").await.unwrap();

        assert_eq!(reply, "generated answer");
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("PDF_STATS:\ndoc.pdf \u{2014} 2 pages, 5 words"));
        assert!(prompt.contains("[doc.pdf - p2]: Foo bar baz"));
        assert!(prompt.contains("[doc.pdf - p1]: Hello world"));
        assert!(prompt.contains("User Question: what says foo?\nAnswer:"));
    }

    #[tokio::test]
    async fn retrieval_respects_top_k() {
        let embedder = Arc::new(CountingEmbedder::default());
        let index = index_with(embedder.as_ref()).await;
        let engine = AnswerEngine::new(embedder, Arc::new(RecordingGenerator::default()), 1);

        let hits = engine.retrieve(&index, "foo bar").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.page, 2);
    }

    #[tokio::test]
    async fn generation_errors_propagate() {
        let embedder = Arc::new(CountingEmbedder::default());
        let index = index_with(embedder.as_ref()).await;
        let engine = AnswerEngine::new(embedder, Arc::new(FailingGenerator), DEFAULT_TOP_K);

        let result = engine.answer(&index, &stats(), "anything").await;
        assert!(matches!(result, Err(AnswerError::Generation(_))));
    }

    #[test]
    fn prompt_sections_are_ordered() {
        let prompt = compose_prompt(&stats(), &[], "q");
        let stats_at = prompt.find("PDF_STATS:").unwrap();
        let context_at = prompt.find("Context:").unwrap();
        let question_at = prompt.find("User Question: q").unwrap();
        assert!(stats_at < context_at && context_at < question_at);
    }
}
