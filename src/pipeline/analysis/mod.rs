
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::Result;

const MAX_CONCURRENT_SUBTASKS: usize = 4;

const ENTITY_PROMPT: &str =
    "Extract the key entities (people, organizations, locations, dates) from the document.";
const SUMMARY_PROMPT: &str = "Summarize the document in a few sentences.";
const ANALYSIS_PROMPT: &str =
    "Provide a detailed analysis of the document's main themes and arguments.";

/// Answer-generation capability, supplied by the host. Generation itself is
/// outside this crate; the pipeline only needs prompt-plus-context calls.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, prompt: &str, context: &str) -> Result<String>;
}

/// Combined result of the three analysis subtasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAnalysis {
    pub entities: String,
    pub summary: String,
    pub analysis: String,
    pub word_count: usize,
    pub char_count: usize,
    pub processed_at: DateTime<Utc>,
}

/// Runs entity extraction, summarization, and detailed analysis against an
/// [`Answerer`] concurrently, bounded by a semaphore.
pub struct DocumentAnalyzer {
    answerer: Arc<dyn Answerer>,
    semaphore: Arc<Semaphore>,
}

impl DocumentAnalyzer {
    #[inline]
    pub fn new(answerer: Arc<dyn Answerer>) -> Self {
        Self {
            answerer,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_SUBTASKS)),
        }
    }

    /// Run all three subtasks over the document text and join the results.
    /// Any subtask failure fails the whole analysis.
    #[inline]
    pub async fn analyze(&self, text: &str) -> Result<DocumentAnalysis> {
        debug!("Analyzing document of {} characters", text.chars().count());

        let (entities, summary, analysis) = tokio::try_join!(
            self.run_subtask(ENTITY_PROMPT, text),
            self.run_subtask(SUMMARY_PROMPT, text),
            self.run_subtask(ANALYSIS_PROMPT, text),
        )?;

        Ok(DocumentAnalysis {
            entities,
            summary,
            analysis,
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            processed_at: Utc::now(),
        })
    }

    async fn run_subtask(&self, prompt: &str, context: &str) -> Result<String> {
        // Closed semaphore is unreachable; we never close it
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| anyhow::anyhow!("Analysis semaphore closed: {}", e))?;
        self.answerer.answer(prompt, context).await
    }
}
