use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read comments file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid comments file: {0}")]
    DataFormat(String),
    #[error("Language model '{model}' is not available: {reason}")]
    ModelUnavailable { model: String, reason: String },
    #[error("Annotation failed: {0}")]
    Annotation(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AppError {
    pub fn model_unavailable(model: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::ModelUnavailable {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Stable identifier the frontend switches on.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Io(_) => "io",
            AppError::DataFormat(_) => "data-format",
            AppError::ModelUnavailable { .. } => "model-unavailable",
            AppError::Annotation(_) => "annotation",
            AppError::Config(_) => "config",
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            if let csv::ErrorKind::Io(io) = err.into_kind() {
                return AppError::Io(io);
            }
            return AppError::DataFormat("unreadable CSV input".to_string());
        }
        AppError::DataFormat(err.to_string())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_unavailable_message_names_the_model() {
        let err = AppError::model_unavailable("es_tokenizer", "file not found");
        assert_eq!(err.kind(), "model-unavailable");
        assert_eq!(
            err.to_string(),
            "Language model 'es_tokenizer' is not available: file not found"
        );
    }

    #[test]
    fn test_csv_utf8_error_is_data_format() {
        let data: &[u8] = b"ok\n\xff\xfe broken\n";
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(data);
        let err = reader
            .records()
            .find_map(|r| r.err())
            .expect("invalid utf-8 should fail");
        assert_eq!(AppError::from(err).kind(), "data-format");
    }
}
