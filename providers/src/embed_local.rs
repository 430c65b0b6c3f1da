//! In-process local embedding backend (C5 "an in-process model"), using
//! `fastembed`. Grounded on the teacher pack's `eval/src/embedding.rs`
//! `FastEmbed` variant: blocking model init moved to `spawn_blocking`,
//! embedding calls serialized behind a `Mutex` since `TextEmbedding` is
//! `!Sync`.
//!
//! SPEC_FULL.md §4.5 requirement 4: a missing local model must fail with
//! an actionable error naming the exact install command. `fastembed`
//! downloads models from Hugging Face Hub on first use rather than
//! requiring a separate install step, so `ensure_model_available` performs
//! that download eagerly and surfaces the HF repo id to download manually
//! if the automatic fetch fails (e.g. no network egress in this
//! environment).

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use common::error::EngineError;
use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
use tokio::sync::Mutex;

use crate::traits::EmbedProvider;

pub struct LocalEmbedProvider {
    model: Arc<Mutex<Option<TextEmbedding>>>,
    model_name: EmbeddingModel,
}

impl LocalEmbedProvider {
    /// `model_id` is a `fastembed::EmbeddingModel` code (e.g.
    /// `"BAAI/bge-small-en-v1.5"`); falls back to the library default when
    /// unrecognized.
    pub fn new(model_id: &str) -> Self {
        let model_name = EmbeddingModel::from_str(model_id).unwrap_or_default();
        Self {
            model: Arc::new(Mutex::new(None)),
            model_name,
        }
    }

    async fn loaded_model(&self) -> Result<(), EngineError> {
        let mut guard = self.model.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let model_name = self.model_name.clone();
        let model_code = model_name.to_string();
        let model = tokio::task::spawn_blocking(move || {
            let options = TextInitOptions::new(model_name).with_show_download_progress(true);
            TextEmbedding::try_new(options)
        })
        .await
        .map_err(EngineError::Join)?
        .map_err(|e| {
            EngineError::Validation(format!(
                "local embedding model '{model_code}' is not available: {e}. \
                 Install it by pre-fetching the Hugging Face repo, e.g.: \
                 `huggingface-cli download {model_code}`"
            ))
        })?;
        *guard = Some(model);
        Ok(())
    }
}

#[async_trait]
impl EmbedProvider for LocalEmbedProvider {
    fn provider_id(&self) -> &'static str {
        "local"
    }

    async fn embed(&self, texts: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, EngineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.loaded_model().await?;
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut guard = model.blocking_lock();
            let model = guard
                .as_mut()
                .ok_or_else(|| EngineError::Internal("local embedding model not loaded".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| EngineError::Internal(format!("local embedding failed: {e}")))
        })
        .await
        .map_err(EngineError::Join)?
    }

    async fn ensure_model_available(&self, _model_id: &str) -> Result<(), EngineError> {
        self.loaded_model().await
    }
}
