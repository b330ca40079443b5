use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::error::AppError;

/// Read the comment column of a headerless CSV file.
///
/// Rows are deduplicated on their full contents (first occurrence wins),
/// then the first column is taken. Rows whose first column is blank carry
/// no comment and are skipped. An empty file yields no comments; a file
/// with rows but no usable first column is a format error.
pub fn read_comments(path: &Path) -> Result<Vec<String>, AppError> {
    let file = std::fs::File::open(path)?;
    let comments = read_comments_from(file)?;
    info!(path = %path.display(), comments = comments.len(), "loaded comments");
    Ok(comments)
}

pub fn read_comments_from<R: Read>(reader: R) -> Result<Vec<String>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut comments = Vec::new();
    let mut duplicates = 0usize;
    let mut rows = 0usize;

    for record in reader.records() {
        let record = record?;
        rows += 1;
        let row: Vec<String> = record.iter().map(|field| field.to_string()).collect();
        if !seen.insert(row) {
            duplicates += 1;
            continue;
        }
        match record.get(0) {
            Some(first) if !first.trim().is_empty() => comments.push(first.to_string()),
            _ => {}
        }
    }

    debug!(duplicates, "dropped duplicate rows");
    if rows > 0 && comments.is_empty() {
        return Err(AppError::DataFormat(
            "no usable first column".to_string(),
        ));
    }
    Ok(comments)
}
