use nlprule::Tokenizer;
use std::path::Path;
use tracing::info;

use crate::error::AppError;
use crate::nlp::{PosTag, TaggedToken, Tagger};

/// POS tagging and lemmatization backed by an nlprule tokenizer binary.
pub struct NlpruleTagger {
    tokenizer: Tokenizer,
}

impl NlpruleTagger {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let started = std::time::Instant::now();
        let tokenizer = Tokenizer::new(path)
            .map_err(|e| AppError::model_unavailable(path.display().to_string(), e.to_string()))?;
        info!(
            "nlprule tokenizer loaded from {:?} in {} ms",
            path,
            started.elapsed().as_millis()
        );
        Ok(Self { tokenizer })
    }
}

impl Tagger for NlpruleTagger {
    fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, AppError> {
        let mut tokens = Vec::new();

        for sentence in self.tokenizer.pipe(text) {
            for token in sentence.tokens() {
                let word = token.word();
                let surface = word.text().as_str();
                if surface.trim().is_empty() {
                    continue;
                }

                // Heuristic: several readings may survive disambiguation, take the first usable one
                let reading = word.tags().iter().find(|data| {
                    let pos = data.pos().as_str();
                    !pos.is_empty() && !pos.starts_with("SENT")
                });

                let token = match reading {
                    Some(data) => {
                        let lemma = data.lemma().as_str();
                        let lemma = if lemma.is_empty() { surface } else { lemma };
                        TaggedToken::new(surface, lemma, PosTag::from_eagles(data.pos().as_str()))
                    }
                    None => TaggedToken::new(surface, surface, PosTag::Other),
                };
                tokens.push(token);
            }
        }

        Ok(tokens)
    }
}
