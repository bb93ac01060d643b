//! Runtime configuration.
//!
//! Every section has defaults, so an empty TOML document is a valid config.

use crate::error::PipelineError;
use crate::phrases::PhraseEntry;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AssistantConfig {
    pub chunking: ChunkingSection,
    pub retrieval: RetrievalSection,
    pub context: ContextSection,
    pub backend: BackendSection,
    pub phrases: PhrasesSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    pub max_chars: usize,
    pub min_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            max_chars: 1_000,
            min_chars: 40,
            overlap_chars: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
    pub min_score: f64,
    pub filter_by_intent: bool,
    pub filter_by_product: bool,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: 0.05,
            filter_by_intent: true,
            filter_by_product: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextSection {
    pub max_chars: usize,
    pub strict_sections: bool,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_chars: 3_000,
            strict_sections: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub pivot_temperature: f32,
    pub render_temperature: f32,
    pub translation_timeout_ms: u64,
    pub retrieval_timeout_ms: u64,
    pub generation_timeout_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
            pivot_temperature: 0.3,
            render_temperature: 0.7,
            translation_timeout_ms: 15_000,
            retrieval_timeout_ms: 5_000,
            generation_timeout_ms: 30_000,
        }
    }
}

impl BackendSection {
    pub fn translation_timeout(&self) -> Duration {
        Duration::from_millis(self.translation_timeout_ms)
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieval_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PhrasesSection {
    /// Merged over the built-in table; same English phrase replaces.
    pub entries: Vec<PhraseEntry>,
}

impl AssistantConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, PipelineError> {
        let config: Self =
            toml::from_str(raw).map_err(|error| PipelineError::Config(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            PipelineError::Config(format!("cannot read {}: {error}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunking.max_chars == 0 {
            return Err(PipelineError::Config(
                "chunking.max_chars must be positive".to_string(),
            ));
        }
        if self.chunking.min_chars > self.chunking.max_chars {
            return Err(PipelineError::Config(format!(
                "chunking.min_chars {} exceeds max_chars {}",
                self.chunking.min_chars, self.chunking.max_chars
            )));
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(PipelineError::Config(
                "chunking.overlap_chars must be smaller than max_chars".to_string(),
            ));
        }
        if self.context.max_chars == 0 {
            return Err(PipelineError::Config(
                "context.max_chars must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(PipelineError::Config(format!(
                "retrieval.min_score {} is outside 0..=1",
                self.retrieval.min_score
            )));
        }
        Ok(())
    }
}
