use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::config::ModelsConfig;
use crate::error::AppError;
use crate::ner::GlinerRecognizer;
use crate::nlp::{EntityRecognizer, LanguageModels, Tagger};
use crate::resources::{self, DownloadStatus};
use crate::tagger::NlpruleTagger;

/// The two pre-trained models, loaded on first use and kept for the rest of
/// the process. A failed load is not cached, so a later run retries it.
pub struct PretrainedModels {
    config: ModelsConfig,
    tagger: OnceLock<Arc<NlpruleTagger>>,
    recognizer: OnceLock<Arc<GlinerRecognizer>>,
}

impl PretrainedModels {
    pub fn new(config: ModelsConfig) -> Self {
        Self {
            config,
            tagger: OnceLock::new(),
            recognizer: OnceLock::new(),
        }
    }

    fn tagger_name(&self) -> String {
        format!("{}_tokenizer", self.config.tagger)
    }

    fn load_tagger(&self) -> Result<NlpruleTagger, AppError> {
        let language = &self.config.tagger;
        let path = if self.config.auto_download {
            resources::ensure_tagger_model(language, log_download)
                .map_err(|reason| AppError::model_unavailable(self.tagger_name(), reason))?
        } else {
            let path = resources::get_tagger_path(language);
            if !path.exists() {
                return Err(AppError::model_unavailable(
                    self.tagger_name(),
                    format!("not installed at {:?}", path),
                ));
            }
            path
        };
        NlpruleTagger::load(&path)
    }

    fn load_recognizer(&self) -> Result<GlinerRecognizer, AppError> {
        let repo = &self.config.entities;
        let dir = if self.config.auto_download {
            resources::ensure_gliner_model(repo, log_download)
                .map_err(|reason| AppError::model_unavailable(repo.clone(), reason))?
        } else {
            if !resources::is_gliner_available(repo) {
                return Err(AppError::model_unavailable(
                    repo.clone(),
                    format!("not installed at {:?}", resources::get_gliner_dir(repo)),
                ));
            }
            resources::get_gliner_dir(repo)
        };
        GlinerRecognizer::load(&dir, self.config.entity_labels.clone())
    }
}

impl LanguageModels for PretrainedModels {
    fn tagger(&self) -> Result<Arc<dyn Tagger>, AppError> {
        if let Some(tagger) = self.tagger.get() {
            let tagger: Arc<dyn Tagger> = tagger.clone();
            return Ok(tagger);
        }
        info!("Loading tagging model '{}'", self.tagger_name());
        let loaded = Arc::new(self.load_tagger()?);
        let tagger: Arc<dyn Tagger> = self.tagger.get_or_init(|| loaded).clone();
        Ok(tagger)
    }

    fn recognizer(&self) -> Result<Arc<dyn EntityRecognizer>, AppError> {
        if let Some(recognizer) = self.recognizer.get() {
            let recognizer: Arc<dyn EntityRecognizer> = recognizer.clone();
            return Ok(recognizer);
        }
        info!("Loading entity model '{}'", self.config.entities);
        let loaded = Arc::new(self.load_recognizer()?);
        let recognizer: Arc<dyn EntityRecognizer> = self.recognizer.get_or_init(|| loaded).clone();
        Ok(recognizer)
    }
}

fn log_download(status: DownloadStatus) {
    match status {
        DownloadStatus::Downloading {
            file,
            progress,
            total,
        } => debug!(file = %file, progress, total, "downloading model"),
        other => debug!(status = ?other, "model resource"),
    }
}
