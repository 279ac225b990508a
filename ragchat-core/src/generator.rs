//! Answer generation from a question and retrieved context

use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::types::{Query, RetrievedPassage};
use std::sync::Arc;

/// Default RAG prompt, with `{question}` and `{context}` placeholders
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.
Question: {question}
Context: {context}
Answer:";

/// Separator between passages in the rendered context
pub const PASSAGE_SEPARATOR: &str = "\n\n";

pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    template: String,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(self, template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..self
        }
    }

    /// Passage contents in retrieval order, separated by a blank line
    pub fn format_context(context: &[RetrievedPassage]) -> String {
        context
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR)
    }

    /// Fill the template in one pass, so placeholder text inside the
    /// question or the context is left alone.
    pub fn render_prompt(&self, question: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }

    /// The model's response, verbatim
    pub async fn generate(&self, query: &Query, context: &[RetrievedPassage]) -> Result<String> {
        let prompt = self.render_prompt(query.as_str(), &Self::format_context(context));
        tracing::debug!(
            "Generating with {} ({} passages, {} prompt bytes)",
            self.model.model_name(),
            context.len(),
            prompt.len()
        );
        self.model
            .complete(&prompt)
            .await
            .map_err(RagError::generation)
    }
}
