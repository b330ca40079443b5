use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppError;
use crate::frequency::{aggregate_all, CategoryCounters};
use crate::models::PretrainedModels;
use crate::sanitize::Sanitizer;

/// Coarse part of speech, normalized from the tagger's own tagset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PosTag {
    Noun,
    ProperNoun,
    Verb,
    Auxiliary,
    Adjective,
    Adverb,
    Determiner,
    Pronoun,
    Adposition,
    Conjunction,
    Numeral,
    Punctuation,
    Interjection,
    Other,
}

impl PosTag {
    /// Map an EAGLES tag as used by the Spanish tagger (`NCMS000`, `NP00000`,
    /// `VMIP3S0`, `VSIP3S0`, `AQ0MS00`, ...).
    pub fn from_eagles(tag: &str) -> Self {
        if tag.starts_with("SENT") {
            return PosTag::Other;
        }
        let mut chars = tag.chars();
        match (chars.next(), chars.next()) {
            (Some('N'), Some('P')) => PosTag::ProperNoun,
            (Some('N'), _) => PosTag::Noun,
            (Some('V'), Some('A' | 'S')) => PosTag::Auxiliary,
            (Some('V'), _) => PosTag::Verb,
            (Some('A'), _) => PosTag::Adjective,
            (Some('R'), _) => PosTag::Adverb,
            (Some('D'), _) => PosTag::Determiner,
            (Some('P'), _) => PosTag::Pronoun,
            (Some('S'), _) => PosTag::Adposition,
            (Some('C'), _) => PosTag::Conjunction,
            (Some('Z'), _) => PosTag::Numeral,
            (Some('F'), _) => PosTag::Punctuation,
            (Some('I'), _) => PosTag::Interjection,
            _ => PosTag::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedToken {
    pub text: String,
    pub lemma: String,
    pub pos: PosTag,
    pub is_stop: bool,
}

impl TaggedToken {
    pub fn new(text: impl Into<String>, lemma: impl Into<String>, pos: PosTag) -> Self {
        Self {
            text: text.into(),
            lemma: lemma.into(),
            pos,
            is_stop: false,
        }
    }
}

/// One comment after sanitizing and both model passes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotatedDocument {
    /// Lemmas of the kept tokens joined by single spaces.
    pub normalized: String,
    /// Tokens of `normalized`, tagged in the second pass.
    pub tokens: Vec<TaggedToken>,
    pub entities: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct AnalysisProgress {
    pub stage: String,
    pub progress: u8,
    pub detail: Option<String>,
}

/// Tokenizer, POS tagger and lemmatizer (the heavier model).
pub trait Tagger: Send + Sync {
    fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, AppError>;
}

/// Named-entity recognizer (the lighter model). Returns one list of entity
/// surface strings per input text.
pub trait EntityRecognizer: Send + Sync {
    fn entities(&self, texts: &[&str]) -> Result<Vec<Vec<String>>, AppError>;
}

/// Source of loaded models. Implementations decide how and when to load.
pub trait LanguageModels: Send + Sync {
    fn tagger(&self) -> Result<Arc<dyn Tagger>, AppError>;
    fn recognizer(&self) -> Result<Arc<dyn EntityRecognizer>, AppError>;
}

/// Turns a list of comments into the five category counters.
pub trait CommentAnalyzer: Send + Sync {
    fn analyze(
        &self,
        comments: &[String],
        on_progress: &mut dyn FnMut(AnalysisProgress),
    ) -> Result<CategoryCounters, AppError>;
}

pub struct NlpPipeline {
    sanitizer: Sanitizer,
    stopwords: HashSet<String>,
    min_token_chars: usize,
    models: Arc<dyn LanguageModels>,
}

impl NlpPipeline {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let models = Arc::new(PretrainedModels::new(config.models.clone()));
        Self::with_models(config, models)
    }

    pub fn with_models(config: &Config, models: Arc<dyn LanguageModels>) -> Result<Self, AppError> {
        Ok(Self {
            sanitizer: Sanitizer::new(&config.sanitizer)?,
            stopwords: stopwords_for(&config.language.code)?,
            min_token_chars: config.pipeline.min_token_chars,
            models,
        })
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(&word.to_lowercase())
    }

    fn tag(&self, tagger: &dyn Tagger, text: &str) -> Result<Vec<TaggedToken>, AppError> {
        let mut tokens = tagger.tag(text)?;
        for token in &mut tokens {
            token.is_stop = self.is_stopword(&token.text);
        }
        Ok(tokens)
    }

    /// First pass: tag the sanitized text and join the lemmas of the tokens
    /// that are neither stopwords nor shorter than the minimum length.
    fn normalize(&self, tagger: &dyn Tagger, sanitized: &str) -> Result<String, AppError> {
        let lemmas: Vec<String> = self
            .tag(tagger, sanitized)?
            .into_iter()
            .filter(|t| !t.is_stop && t.text.chars().count() >= self.min_token_chars)
            .map(|t| t.lemma)
            .collect();
        Ok(lemmas.join(" "))
    }

    /// Lemmatize a sanitized comment and tag the lemmatized text again.
    ///
    /// Tags therefore describe the normalized, stopword-free text rather than
    /// the original sentence; category counts are built from these tags.
    pub fn annotate_tagged(&self, sanitized: &str) -> Result<Vec<TaggedToken>, AppError> {
        let tagger = self.models.tagger()?;
        let normalized = self.normalize(&*tagger, sanitized)?;
        self.tag(&*tagger, &normalized)
    }

    /// Entity surface strings found in an already normalized text.
    pub fn annotate_entities(&self, normalized: &str) -> Result<Vec<String>, AppError> {
        let recognizer = self.models.recognizer()?;
        Ok(recognizer
            .entities(&[normalized])?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Sanitize one raw comment and run both passes and the entity model.
    pub fn annotate(&self, comment: &str) -> Result<AnnotatedDocument, AppError> {
        let tagger = self.models.tagger()?;
        let sanitized = self.sanitizer.sanitize(comment);
        let normalized = self.normalize(&*tagger, &sanitized)?;
        let tokens = self.tag(&*tagger, &normalized)?;
        let entities = self.annotate_entities(&normalized)?;
        Ok(AnnotatedDocument {
            normalized,
            tokens,
            entities,
        })
    }

    pub fn analyze<F>(&self, comments: &[String], mut on_progress: F) -> Result<CategoryCounters, AppError>
    where
        F: FnMut(AnalysisProgress),
    {
        let total = comments.len();
        if total == 0 {
            info!("No comments to analyze");
            on_progress(AnalysisProgress {
                stage: "Completo".to_string(),
                progress: 100,
                detail: Some("0 comentarios".to_string()),
            });
            return Ok(CategoryCounters::default());
        }

        on_progress(AnalysisProgress {
            stage: "Cargando modelo de etiquetado".to_string(),
            progress: 5,
            detail: None,
        });
        let tagger = self.models.tagger()?;

        let report_every = (total / 20).max(1);
        let mut documents = Vec::with_capacity(total);
        for (i, comment) in comments.iter().enumerate() {
            let sanitized = self.sanitizer.sanitize(comment);
            let normalized = self.normalize(&*tagger, &sanitized)?;
            let tokens = self.tag(&*tagger, &normalized)?;
            documents.push(AnnotatedDocument {
                normalized,
                tokens,
                entities: Vec::new(),
            });

            let done = i + 1;
            if done % report_every == 0 || done == total {
                on_progress(AnalysisProgress {
                    stage: "Etiquetando comentarios".to_string(),
                    progress: 10 + (done * 60 / total) as u8,
                    detail: Some(format!("{}/{} comentarios", done, total)),
                });
            }
        }
        debug!(documents = documents.len(), "tagging finished");

        on_progress(AnalysisProgress {
            stage: "Buscando entidades".to_string(),
            progress: 75,
            detail: None,
        });
        let recognizer = self.models.recognizer()?;
        let entities = {
            let texts: Vec<&str> = documents.iter().map(|d| d.normalized.as_str()).collect();
            recognizer.entities(&texts)?
        };
        if entities.len() != documents.len() {
            return Err(AppError::Annotation(format!(
                "entity model returned {} results for {} comments",
                entities.len(),
                documents.len()
            )));
        }
        for (document, found) in documents.iter_mut().zip(entities) {
            document.entities = found;
        }

        let counters = aggregate_all(&documents);
        info!(
            comments = total,
            nouns = counters.nouns.len(),
            verbs = counters.verbs.len(),
            adjectives = counters.adjectives.len(),
            proper_nouns = counters.proper_nouns.len(),
            entities = counters.entities.len(),
            "analysis finished"
        );

        on_progress(AnalysisProgress {
            stage: "Completo".to_string(),
            progress: 100,
            detail: Some(format!("{} comentarios", total)),
        });

        Ok(counters)
    }
}

impl CommentAnalyzer for NlpPipeline {
    fn analyze(
        &self,
        comments: &[String],
        on_progress: &mut dyn FnMut(AnalysisProgress),
    ) -> Result<CategoryCounters, AppError> {
        NlpPipeline::analyze(self, comments, on_progress)
    }
}

fn stopwords_for(code: &str) -> Result<HashSet<String>, AppError> {
    use stop_words::LANGUAGE;

    let language = match code {
        "es" => LANGUAGE::Spanish,
        "en" => LANGUAGE::English,
        "pt" => LANGUAGE::Portuguese,
        "fr" => LANGUAGE::French,
        "de" => LANGUAGE::German,
        "it" => LANGUAGE::Italian,
        other => {
            return Err(AppError::Config(format!(
                "no stopword list for language '{}'",
                other
            )))
        }
    };
    let words = stop_words::get(language);
    Ok(words.iter().map(|w| w.to_lowercase()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::Category;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Whitespace tokenizer with a small Spanish lexicon.
    struct LexiconTagger {
        lexicon: HashMap<&'static str, (&'static str, PosTag)>,
        calls: AtomicUsize,
    }

    impl LexiconTagger {
        fn new() -> Self {
            let lexicon = HashMap::from([
                ("encantó", ("encantar", PosTag::Verb)),
                ("encantar", ("encantar", PosTag::Verb)),
                ("evento", ("evento", PosTag::Noun)),
                ("transporte", ("transporte", PosTag::Noun)),
                ("fue", ("ser", PosTag::Auxiliary)),
                ("ser", ("ser", PosTag::Auxiliary)),
                ("pésimo", ("pésimo", PosTag::Adjective)),
                ("llegaron", ("llegar", PosTag::Verb)),
                ("llegar", ("llegar", PosTag::Verb)),
                ("puntuales", ("puntual", PosTag::Adjective)),
                ("puntual", ("puntual", PosTag::Adjective)),
                ("camiones", ("camión", PosTag::Noun)),
                ("camión", ("camión", PosTag::Noun)),
                ("FES", ("FES", PosTag::ProperNoun)),
                ("el", ("el", PosTag::Determiner)),
                ("me", ("yo", PosTag::Pronoun)),
                ("en", ("en", PosTag::Adposition)),
                ("con", ("con", PosTag::Adposition)),
            ]);
            Self {
                lexicon,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Tagger for LexiconTagger {
        fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text
                .split_whitespace()
                .map(|word| {
                    let word = word.trim_matches(|c: char| c.is_ascii_punctuation() || c == '¡' || c == '¿');
                    let key = if word == "FES" { word.to_string() } else { word.to_lowercase() };
                    match self.lexicon.get(key.as_str()) {
                        Some((lemma, pos)) => TaggedToken::new(word, *lemma, *pos),
                        None => TaggedToken::new(word, key.clone(), PosTag::Other),
                    }
                })
                .filter(|t| !t.text.is_empty())
                .collect())
        }
    }

    /// Treats every upper-case word as an entity.
    struct CapitalizedRecognizer;

    impl EntityRecognizer for CapitalizedRecognizer {
        fn entities(&self, texts: &[&str]) -> Result<Vec<Vec<String>>, AppError> {
            Ok(texts
                .iter()
                .map(|text| {
                    text.split_whitespace()
                        .filter(|w| w.chars().next().map(char::is_uppercase).unwrap_or(false))
                        .map(|w| w.to_string())
                        .collect()
                })
                .collect())
        }
    }

    struct FakeModels {
        tagger: Arc<LexiconTagger>,
    }

    impl LanguageModels for FakeModels {
        fn tagger(&self) -> Result<Arc<dyn Tagger>, AppError> {
            let tagger: Arc<dyn Tagger> = self.tagger.clone();
            Ok(tagger)
        }

        fn recognizer(&self) -> Result<Arc<dyn EntityRecognizer>, AppError> {
            Ok(Arc::new(CapitalizedRecognizer))
        }
    }

    struct MissingModels;

    impl LanguageModels for MissingModels {
        fn tagger(&self) -> Result<Arc<dyn Tagger>, AppError> {
            Err(AppError::model_unavailable("es_tokenizer", "not installed"))
        }

        fn recognizer(&self) -> Result<Arc<dyn EntityRecognizer>, AppError> {
            Err(AppError::model_unavailable("gliner", "not installed"))
        }
    }

    fn pipeline() -> (NlpPipeline, Arc<LexiconTagger>) {
        let tagger = Arc::new(LexiconTagger::new());
        let models = Arc::new(FakeModels {
            tagger: tagger.clone(),
        });
        (NlpPipeline::with_models(&Config::default(), models).unwrap(), tagger)
    }

    #[test]
    fn test_eagles_tags() {
        assert_eq!(PosTag::from_eagles("NCMS000"), PosTag::Noun);
        assert_eq!(PosTag::from_eagles("NP00000"), PosTag::ProperNoun);
        assert_eq!(PosTag::from_eagles("VMIP3S0"), PosTag::Verb);
        assert_eq!(PosTag::from_eagles("VSIS3S0"), PosTag::Auxiliary);
        assert_eq!(PosTag::from_eagles("VAIP3S0"), PosTag::Auxiliary);
        assert_eq!(PosTag::from_eagles("AQ0MS00"), PosTag::Adjective);
        assert_eq!(PosTag::from_eagles("SPS00"), PosTag::Adposition);
        assert_eq!(PosTag::from_eagles("Fp"), PosTag::Punctuation);
        assert_eq!(PosTag::from_eagles("SENT_START"), PosTag::Other);
        assert_eq!(PosTag::from_eagles(""), PosTag::Other);
    }

    #[test]
    fn test_spanish_stopwords_loaded() {
        let (pipeline, _) = pipeline();
        assert!(pipeline.is_stopword("el"));
        assert!(pipeline.is_stopword("El"));
        assert!(pipeline.is_stopword("fue"));
        assert!(!pipeline.is_stopword("transporte"));
    }

    #[test]
    fn test_unknown_language_is_config_error() {
        let mut config = Config::default();
        config.language.code = "tlh".to_string();
        let err = NlpPipeline::with_models(&config, Arc::new(MissingModels)).err().unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_normalization_drops_stopwords_and_short_tokens() {
        let (pipeline, _) = pipeline();
        let doc = pipeline.annotate("Me encantó el evento").unwrap();
        assert_eq!(doc.normalized, "encantar evento");
    }

    #[test]
    fn test_annotate_tagged_retags_normalized_text() {
        let (pipeline, tagger) = pipeline();
        let tokens = pipeline.annotate_tagged("Los camiones llegaron puntuales").unwrap();

        assert_eq!(tagger.calls.load(Ordering::SeqCst), 2);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["camión", "llegar", "puntual"]);
        assert_eq!(tokens[0].pos, PosTag::Noun);
        assert_eq!(tokens[1].pos, PosTag::Verb);
        assert_eq!(tokens[2].pos, PosTag::Adjective);
    }

    #[test]
    fn test_entities_come_from_normalized_text() {
        let (pipeline, _) = pipeline();
        let doc = pipeline
            .annotate("Evento en FES Acatlán con Transporte + Recorridos")
            .unwrap();
        assert_eq!(doc.normalized, "evento FES transporte");
        assert_eq!(doc.entities, vec!["FES"]);
    }

    #[test]
    fn test_end_to_end_counts() {
        let (pipeline, _) = pipeline();
        let comments = vec![
            "Me encantó el evento 😊".to_string(),
            "El transporte fue pésimo".to_string(),
        ];

        let mut stages = Vec::new();
        let counters = pipeline
            .analyze(&comments, |p| stages.push(p.progress))
            .unwrap();

        assert_eq!(counters.nouns.get("evento"), 1);
        assert_eq!(counters.nouns.get("transporte"), 1);
        assert_eq!(counters.verbs.get("encantar"), 1);
        assert_eq!(counters.adjectives.get("pésimo"), 1);
        assert!(counters.proper_nouns.is_empty());

        let sanitized_tokens: usize = comments
            .iter()
            .map(|c| pipeline.sanitizer().sanitize(c).split_whitespace().count())
            .sum();
        let counted = counters.get(Category::Noun).total()
            + counters.get(Category::Verb).total()
            + counters.get(Category::Adjective).total();
        assert!(counted > 0 && counted <= sanitized_tokens);

        assert_eq!(stages.last(), Some(&100));
        assert!(stages.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_comment_list_is_not_an_error() {
        let pipeline = NlpPipeline::with_models(&Config::default(), Arc::new(MissingModels)).unwrap();
        let counters = pipeline.analyze(&[], |_| {}).unwrap();
        assert!(counters.is_empty());
    }

    #[test]
    fn test_missing_model_is_distinguishable() {
        let pipeline = NlpPipeline::with_models(&Config::default(), Arc::new(MissingModels)).unwrap();
        let err = pipeline
            .analyze(&["algo".to_string()], |_| {})
            .unwrap_err();
        assert!(matches!(err, AppError::ModelUnavailable { .. }));
    }
}
