//! Two-stage answer generation.
//!
//! Stage one answers in the pivot language from the assembled context only.
//! Stage two writes that answer afresh in the user's language; it is not a
//! back-translation. Both prompts are built by pure functions so they can be
//! inspected without a backend.

use crate::error::{BackendError, PipelineError};
use crate::models::{Context, Intent, Language, Query};
use crate::phrases::PhraseBook;
use crate::traits::{CompletionBackend, Prompt};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub pivot_temperature: f32,
    pub render_temperature: f32,
    pub timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            pivot_temperature: 0.3,
            render_temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer_text: String,
    pub source_list: Vec<String>,
    /// Stage-one answer; `None` when no backend call was made.
    pub pivot_answer: Option<String>,
}

pub fn intent_instruction(intent: Intent) -> &'static str {
    match intent {
        Intent::Benefits => {
            "Focus ONLY on benefits and advantages. Do NOT discuss requirements, \
             eligibility or fees, even if they appear in the context."
        }
        Intent::Requirements => {
            "Focus ONLY on requirements and eligibility criteria. Do NOT discuss benefits or fees."
        }
        Intent::Fees => "Focus ONLY on fees, costs, interest and charges. Be specific about amounts.",
        Intent::Features => "Focus on how the product works and its features.",
        Intent::General => "Provide a balanced overview covering the key aspects.",
    }
}

pub fn apology(language: Language) -> &'static str {
    match language {
        Language::Chichewa => "Pepani, panali vuto pakupanga yankho. Mungafunse mwanjira ina?",
        Language::English => {
            "I apologize, there was an error generating the answer. \
             Could you try rephrasing your question?"
        }
    }
}

pub fn no_information_reply(language: Language) -> &'static str {
    match language {
        Language::Chichewa => {
            "Pepani, sindinapeze zambiri za funso lanu m'zikalata zathu. \
             Mungafunse za akaunti kapena ngongole zathu mwanjira ina?"
        }
        Language::English => {
            "I couldn't find any relevant information about that in our product documents. \
             Could you ask about one of our accounts or loans in another way?"
        }
    }
}

pub struct AnswerGenerator<G> {
    backend: G,
    phrases: PhraseBook,
    settings: GeneratorSettings,
}

impl<G> AnswerGenerator<G>
where
    G: CompletionBackend,
{
    pub fn new(backend: G, phrases: PhraseBook, settings: GeneratorSettings) -> Self {
        Self {
            backend,
            phrases,
            settings,
        }
    }

    pub fn backend(&self) -> &G {
        &self.backend
    }

    pub fn phrases(&self) -> &PhraseBook {
        &self.phrases
    }

    /// Stage one: grounded answer in the pivot language.
    pub fn pivot_prompt(&self, query: &Query, context: &Context) -> Prompt {
        let system = format!(
            "You are a friendly, knowledgeable bank assistant helping customers understand \
             banking products.\n\
             Answer ONLY from the context below. Do not introduce facts, amounts or products \
             that are absent from it. If the context does not answer the question, say so.\n\n\
             FOCUS INSTRUCTION:\n{}",
            intent_instruction(query.intent)
        );
        let product_line = query
            .product_id
            .as_ref()
            .map(|product| format!("Product: {}\n", product.display_name()))
            .unwrap_or_default();
        let user = format!(
            "CONTEXT:\n{}\n\n{}Customer question: {}\n\n\
             Answer clearly, with bullet points for lists, and end with an offer to help further.",
            context.text, product_line, query.pivot_text
        );
        Prompt {
            system,
            user,
            temperature: self.settings.pivot_temperature,
        }
    }

    /// Stage two: fresh rendering of the pivot answer in `target`.
    pub fn render_prompt(&self, query: &Query, pivot_answer: &str, target: Language) -> Prompt {
        let system = format!(
            "You write natural, conversational {target} for bank customers. Write the answer \
             below directly in {target}; do not translate it word for word. Keep every fact and \
             amount exactly as given and add nothing.\n\
             Discuss only what the focus instruction allows: {}\n\n{}",
            intent_instruction(query.intent),
            self.phrases.guidelines()
        );
        let user = format!(
            "Customer question ({}): {}\n\nAnswer to rewrite:\n{}\n\nAnswer in {target}:",
            query.source_language, query.raw_text, pivot_answer
        );
        Prompt {
            system,
            user,
            temperature: self.settings.render_temperature,
        }
    }

    /// Runs both stages. An empty context short-circuits to a fixed reply
    /// without touching the backend.
    pub async fn generate(
        &self,
        query: &Query,
        context: &Context,
        target: Language,
    ) -> Result<GeneratedAnswer, PipelineError> {
        if context.is_empty() {
            debug!("empty context, no backend call");
            return Ok(GeneratedAnswer {
                answer_text: no_information_reply(target).to_string(),
                source_list: Vec::new(),
                pivot_answer: None,
            });
        }

        let pivot_answer = self.complete(&self.pivot_prompt(query, context)).await?;
        debug!(chars = pivot_answer.len(), "pivot answer generated");

        let answer_text = if target.is_pivot() {
            pivot_answer.clone()
        } else {
            let rendered = self
                .complete(&self.render_prompt(query, &pivot_answer, target))
                .await?;
            self.phrases.apply(&rendered)
        };

        Ok(GeneratedAnswer {
            answer_text,
            source_list: context.sources.clone(),
            pivot_answer: Some(pivot_answer),
        })
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, PipelineError> {
        let timeout = self.settings.timeout;
        let text = tokio::time::timeout(timeout, self.backend.complete(prompt))
            .await
            .map_err(|_| BackendError::Timeout {
                backend: "generation".to_string(),
                after: timeout,
            })
            .and_then(|result| result)
            .map_err(PipelineError::GenerationUnavailable)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::GenerationUnavailable(
                BackendError::BackendResponse {
                    backend: "generation".to_string(),
                    details: "empty completion".to_string(),
                },
            ));
        }
        Ok(text.to_string())
    }
}
