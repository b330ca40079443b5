//! Integration tests for the comment pipeline
//!
//! These tests verify that:
//! 1. A CSV of comments flows through the shell into five rendered panels
//! 2. Missing models surface as a model-unavailable error, not a panic
//! 3. With the real models installed, Spanish comments land in the expected
//!    categories
//!
//! Run with: cargo test --test pipeline
//!
//! The real-model test is skipped unless both models are already in the
//! resource directory (run the desktop app once to download them).

use comment_cloud_lib::nlp::{AnalysisProgress, EntityRecognizer, LanguageModels, PosTag, TaggedToken, Tagger};
use comment_cloud_lib::resources;
use comment_cloud_lib::shell::{RunState, SelectOutcome, Shell, View};
use comment_cloud_lib::{AppError, Category, Config, NlpPipeline, PanelGrid};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const COMMENTS_CSV: &str = "\
Me encantó el evento en FES Acatlán 😊,5
El transporte fue puntual,4
\"Evento bien organizado, transporte cómodo\",5
Me encantó el evento en FES Acatlán 😊,5
,3
*Excelente* evento • FES Acatlán con Transporte + Recorridos,5
";

/// Lowercase surface as lemma; a handful of known words get a tag.
struct TinyTagger;

impl Tagger for TinyTagger {
    fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, AppError> {
        Ok(text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|w| !w.is_empty())
            .map(|word| {
                let lemma = if word == "FES" { word.to_string() } else { word.to_lowercase() };
                let pos = match lemma.as_str() {
                    "evento" | "transporte" | "recorridos" => PosTag::Noun,
                    "encantó" | "encantar" | "organizado" => PosTag::Verb,
                    "puntual" | "cómodo" | "excelente" => PosTag::Adjective,
                    "FES" => PosTag::ProperNoun,
                    _ => PosTag::Other,
                };
                let lemma = if lemma == "encantó" { "encantar".to_string() } else { lemma };
                TaggedToken::new(word, lemma, pos)
            })
            .collect())
    }
}

struct AcronymRecognizer;

impl EntityRecognizer for AcronymRecognizer {
    fn entities(&self, texts: &[&str]) -> Result<Vec<Vec<String>>, AppError> {
        Ok(texts
            .iter()
            .map(|text| {
                text.split_whitespace()
                    .filter(|w| w.len() > 1 && w.chars().all(|c| c.is_uppercase()))
                    .map(str::to_string)
                    .collect()
            })
            .collect())
    }
}

struct FakeModels;

impl LanguageModels for FakeModels {
    fn tagger(&self) -> Result<Arc<dyn Tagger>, AppError> {
        Ok(Arc::new(TinyTagger))
    }

    fn recognizer(&self) -> Result<Arc<dyn EntityRecognizer>, AppError> {
        Ok(Arc::new(AcronymRecognizer))
    }
}

#[derive(Default)]
struct CapturingView {
    loading: Vec<String>,
    grid: Option<PanelGrid>,
    errors: Vec<String>,
}

impl View for CapturingView {
    fn show_loading(&mut self, message: &str) {
        self.loading.push(message.to_string());
    }

    fn update_loading(&mut self, progress: &AnalysisProgress) {
        self.loading.push(progress.stage.clone());
    }

    fn hide_loading(&mut self) {}

    fn show_notice(&mut self, message: &str) {
        self.loading.push(message.to_string());
    }

    fn show_panels(&mut self, grid: &PanelGrid) {
        self.grid = Some(grid.clone());
    }

    fn show_error(&mut self, error: &AppError) {
        self.errors.push(error.kind().to_string());
    }
}

fn write_csv(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write csv");
    file
}

#[test]
fn test_csv_to_panels_through_shell() {
    let config = Config::default();
    let pipeline = NlpPipeline::with_models(&config, Arc::new(FakeModels)).unwrap();
    let mut shell = Shell::new(CapturingView::default(), Arc::new(pipeline), config.cloud.clone());
    let file = write_csv(COMMENTS_CSV);

    let outcome = shell.select_file(Some(file.path().to_path_buf()));
    // duplicate row and blank first column are dropped
    assert!(matches!(outcome, SelectOutcome::Started { comments: 4 }));
    assert!(shell.wait_until_idle(Duration::from_secs(30)));
    assert_eq!(shell.state(), &RunState::Idle);

    let view = shell.view();
    assert!(view.errors.is_empty(), "errors: {:?}", view.errors);
    assert_eq!(view.loading[0], "Procesando comentarios...");

    let grid = view.grid.as_ref().expect("panels shown");
    assert_eq!(grid.columns, 2);
    let titles: Vec<&str> = grid.panels.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Sustantivos más comunes",
            "Verbos más comunes",
            "Adjetivos más comunes",
            "Nombres propios más comunes",
            "Entidades más comunes",
        ]
    );

    let nouns = &grid.panels[0];
    let top = &nouns.words[0];
    assert_eq!(top.text, "evento");
    assert_eq!(top.count, 3);
    assert!(nouns.words.iter().all(|w| w.text != "Acatlán"));

    let entities = &grid.panels[4];
    assert_eq!(entities.words.len(), 1);
    assert_eq!(entities.words[0].text, "FES");
    assert_eq!(entities.words[0].count, 2);
}

#[test]
fn test_panel_grid_serializes_for_the_frontend() {
    let config = Config::default();
    let pipeline = NlpPipeline::with_models(&config, Arc::new(FakeModels)).unwrap();
    let counters = pipeline
        .analyze(&["El transporte fue puntual".to_string()], |_| {})
        .unwrap();
    let grid = comment_cloud_lib::render_grid(&counters, &config.cloud);

    let json = serde_json::to_value(&grid).unwrap();
    assert_eq!(json["columns"], 2);
    assert_eq!(json["panels"].as_array().unwrap().len(), 5);
    assert_eq!(json["panels"][0]["category"], "noun");
    assert_eq!(json["panels"][4]["category"], "named-entity");
    assert_eq!(json["panels"][4]["words"].as_array().unwrap().len(), 0);
}

#[test]
fn test_missing_models_are_reported() {
    let mut config = Config::default();
    config.models.tagger = "zz".to_string();
    config.models.auto_download = false;

    let pipeline = NlpPipeline::new(&config).unwrap();
    let err = pipeline
        .analyze(&["Me encantó el evento".to_string()], |_| {})
        .unwrap_err();

    assert_eq!(err.kind(), "model-unavailable");
    assert!(err.to_string().contains("zz_tokenizer"), "{}", err);
}

#[test]
fn test_real_models_on_spanish_comments() {
    let config = Config::default();
    if !resources::is_tagger_available(&config.models.tagger)
        || !resources::is_gliner_available(&config.models.entities)
    {
        eprintln!(
            "Skipping test: models not installed under {:?}",
            resources::get_resource_dir()
        );
        return;
    }

    let pipeline = NlpPipeline::new(&config).expect("pipeline");
    let comments: Vec<String> = [
        "Me encantó el evento en FES Acatlán",
        "Los camiones llegaron tarde y el transporte fue incómodo",
        "La comida estuvo deliciosa y el personal muy amable",
        "El evento terminó muy tarde",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let counters = pipeline.analyze(&comments, |_| {}).expect("analysis");

    assert!(counters.nouns.get("evento") >= 1, "nouns: {:?}", counters.nouns);
    assert!(!counters.get(Category::Verb).is_empty(), "verbs: {:?}", counters.verbs);

    let sanitized_tokens: usize = comments
        .iter()
        .map(|c| pipeline.sanitizer().sanitize(c).split_whitespace().count())
        .sum();
    let tagged = counters.nouns.total()
        + counters.verbs.total()
        + counters.adjectives.total()
        + counters.proper_nouns.total();
    assert!(tagged <= sanitized_tokens);
}

#[test]
fn test_unknown_file_is_io_error() {
    let pipeline = NlpPipeline::with_models(&Config::default(), Arc::new(FakeModels)).unwrap();
    let mut shell = Shell::new(CapturingView::default(), Arc::new(pipeline), Default::default());

    let outcome = shell.select_file(Some(PathBuf::from("/no/such/comentarios.csv")));
    assert!(matches!(outcome, SelectOutcome::Failed(AppError::Io(_))));
    assert_eq!(shell.view().errors, vec!["io".to_string()]);
}
