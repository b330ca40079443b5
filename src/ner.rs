use gliner::model::{input::text::TextInput, pipeline::span::SpanMode, GLiNER};
use orp::params::RuntimeParameters;
use std::path::Path;
use tracing::{debug, info};

#[cfg(all(target_os = "macos", feature = "coreml"))]
use ort::execution_providers::CoreMLExecutionProvider;

use crate::error::AppError;
use crate::nlp::EntityRecognizer;

/// Texts per inference call
const BATCH_SIZE: usize = 64;

/// Longer texts are split so they stay inside the model's context window
const MAX_CHUNK_BYTES: usize = 500;

pub struct GlinerRecognizer {
    model: GLiNER<SpanMode>,
    labels: Vec<String>,
}

impl GlinerRecognizer {
    pub fn load(model_dir: &Path, labels: Vec<String>) -> Result<Self, AppError> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        let model_path = model_dir.join("model.onnx");
        let unavailable = |reason: String| AppError::model_unavailable(model_dir.display().to_string(), reason);

        if !tokenizer_path.exists() || !model_path.exists() {
            return Err(unavailable("model.onnx or tokenizer.json missing".to_string()));
        }

        // CoreML execution provider when built with the coreml feature on macOS
        #[cfg(all(target_os = "macos", feature = "coreml"))]
        let runtime_params = RuntimeParameters::default()
            .with_threads(8)
            .with_execution_providers([CoreMLExecutionProvider::default().build()]);

        #[cfg(not(all(target_os = "macos", feature = "coreml")))]
        let runtime_params = RuntimeParameters::default().with_threads(8);

        let model = GLiNER::<SpanMode>::new(
            Default::default(),
            runtime_params,
            tokenizer_path,
            model_path,
        )
        .map_err(|e| unavailable(e.to_string()))?;

        info!("GLiNER model loaded from {:?}", model_dir);
        Ok(Self { model, labels })
    }
}

impl EntityRecognizer for GlinerRecognizer {
    fn entities(&self, texts: &[&str]) -> Result<Vec<Vec<String>>, AppError> {
        let mut results = vec![Vec::new(); texts.len()];

        let chunks: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .flat_map(|(index, text)| {
                split_for_inference(text, MAX_CHUNK_BYTES)
                    .into_iter()
                    .map(move |chunk| (index, chunk))
            })
            .collect();

        if chunks.is_empty() {
            return Ok(results);
        }

        let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        let mut total_infer_ms: u128 = 0;

        for batch in chunks.chunks(BATCH_SIZE) {
            let batch_texts: Vec<&str> = batch.iter().map(|(_, text)| *text).collect();
            let input = TextInput::from_str(&batch_texts, &labels)
                .map_err(|e| AppError::Annotation(format!("Failed to create GLiNER input: {}", e)))?;

            let infer_start = std::time::Instant::now();
            let output = self
                .model
                .inference(input)
                .map_err(|e| AppError::Annotation(format!("GLiNER inference error: {}", e)))?;
            total_infer_ms += infer_start.elapsed().as_millis();

            for ((index, _), spans) in batch.iter().zip(output.spans.iter()) {
                for span in spans.iter() {
                    results[*index].push(span.text().to_string());
                }
            }
        }

        debug!(
            "GLiNER inference: {} ms for {} chunks",
            total_infer_ms,
            chunks.len()
        );
        Ok(results)
    }
}

/// Split `text` into trimmed chunks of at most `max_bytes`, preferring
/// sentence ends, then whitespace.
fn split_for_inference(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while rest.len() > max_bytes {
        let window = &rest[..floor_char_boundary(rest, max_bytes)];
        let cut = window
            .rfind(|c: char| matches!(c, '.' | '!' | '?'))
            .map(|i| i + 1)
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(window.len());

        let (head, tail) = rest.split_at(cut);
        let head = head.trim();
        if !head.is_empty() {
            chunks.push(head);
        }
        rest = tail.trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
