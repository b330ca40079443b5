//! Model resources for comment-cloud
//!
//! Locates, downloads and caches the two pre-trained models: the nlprule
//! tokenizer binary (tagging and lemmas) and the GLiNER ONNX export (named
//! entities). Everything lives under the per-user data directory.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::{debug, info};

/// Base URL for HuggingFace model downloads
const HUGGINGFACE_BASE: &str = "https://huggingface.co";

/// nlprule release the tokenizer binaries are taken from; must match the crate version
const NLPRULE_RELEASE: &str = "https://github.com/bminixhofer/nlprule/releases/download/0.6.4";

/// Get the base resource directory (XDG data directory)
pub fn get_resource_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("comment-cloud")
        .join("resources")
}

pub fn get_tagger_path(language: &str) -> PathBuf {
    get_resource_dir()
        .join("nlprule")
        .join(format!("{}_tokenizer.bin", language))
}

/// Directory of one GLiNER export, e.g. `gliner/onnx-community--gliner_multi-v2.1`
pub fn get_gliner_dir(repo: &str) -> PathBuf {
    get_resource_dir().join("gliner").join(repo.replace('/', "--"))
}

pub fn is_tagger_available(language: &str) -> bool {
    get_tagger_path(language).exists()
}

pub fn is_gliner_available(repo: &str) -> bool {
    has_gliner_files(&get_gliner_dir(repo))
}

fn has_gliner_files(dir: &Path) -> bool {
    dir.join("model.onnx").exists() && dir.join("tokenizer.json").exists()
}

/// Resource download status
#[derive(Debug, Clone)]
pub enum DownloadStatus {
    AlreadyExists,
    Downloading { file: String, progress: u64, total: u64 },
    Completed,
}

/// Ensure the nlprule tokenizer binary is available, downloading if necessary
/// Returns the binary path
pub fn ensure_tagger_model<F>(language: &str, on_progress: F) -> Result<PathBuf, String>
where
    F: Fn(DownloadStatus) + Send,
{
    let path = get_tagger_path(language);
    if path.exists() {
        on_progress(DownloadStatus::AlreadyExists);
        return Ok(path);
    }

    let dir = path
        .parent()
        .ok_or_else(|| format!("Invalid tagger path {:?}", path))?;
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create model directory: {}", e))?;

    let file_name = format!("{}_tokenizer.bin", language);
    let url = format!("{}/{}.gz", NLPRULE_RELEASE, file_name);
    let archive = path.with_extension("bin.gz");

    info!("Downloading nlprule tokenizer from {}...", url);
    download_file(&url, &archive, |progress, total| {
        on_progress(DownloadStatus::Downloading {
            file: file_name.clone(),
            progress,
            total,
        });
    })?;

    let unpacked = gunzip(&archive, &path);
    let _ = fs::remove_file(&archive);
    unpacked?;

    on_progress(DownloadStatus::Completed);
    info!("nlprule tokenizer downloaded successfully to {:?}", path);
    Ok(path)
}

/// Ensure GLiNER model is available, downloading if necessary
/// Returns the model directory path
pub fn ensure_gliner_model<F>(repo: &str, on_progress: F) -> Result<PathBuf, String>
where
    F: Fn(DownloadStatus) + Send,
{
    let model_dir = get_gliner_dir(repo);
    let model_path = model_dir.join("model.onnx");
    let tokenizer_path = model_dir.join("tokenizer.json");

    if has_gliner_files(&model_dir) {
        on_progress(DownloadStatus::AlreadyExists);
        return Ok(model_dir);
    }

    fs::create_dir_all(&model_dir)
        .map_err(|e| format!("Failed to create model directory: {}", e))?;

    // Download tokenizer.json first (smaller file)
    if !tokenizer_path.exists() {
        let url = format!("{}/{}/resolve/main/tokenizer.json", HUGGINGFACE_BASE, repo);
        info!("Downloading GLiNER tokenizer from {}...", url);
        download_file(&url, &tokenizer_path, |progress, total| {
            on_progress(DownloadStatus::Downloading {
                file: "tokenizer.json".to_string(),
                progress,
                total,
            });
        })?;
    }

    if !model_path.exists() {
        let url = format!("{}/{}/resolve/main/onnx/model.onnx", HUGGINGFACE_BASE, repo);
        info!("Downloading GLiNER model from {} (several hundred MB)...", url);
        download_file(&url, &model_path, |progress, total| {
            on_progress(DownloadStatus::Downloading {
                file: "model.onnx".to_string(),
                progress,
                total,
            });
        })?;
    }

    on_progress(DownloadStatus::Completed);
    info!("GLiNER model downloaded successfully to {:?}", model_dir);
    Ok(model_dir)
}

/// Download a file with progress tracking
fn download_file<F>(url: &str, dest: &Path, on_progress: F) -> Result<(), String>
where
    F: Fn(u64, u64),
{
    let response = ureq::get(url)
        .call()
        .map_err(|e| format!("Failed to download {}: {}", url, e))?;

    let total_size = response
        .header("content-length")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let reader = response.into_reader();

    // Use a temporary file to avoid partial downloads
    let temp_path = dest.with_extension("download");
    let downloaded = save_stream(reader, &temp_path, total_size, on_progress)?;

    fs::rename(&temp_path, dest).map_err(|e| format!("Failed to finalize download: {}", e))?;
    debug!(bytes = downloaded, "downloaded {}", url);

    Ok(())
}

/// Copy `reader` into `path`, reporting progress at most every 100ms.
/// A partially written file is removed when the copy fails.
fn save_stream<R, F>(reader: R, path: &Path, total_size: u64, on_progress: F) -> Result<u64, String>
where
    R: Read,
    F: Fn(u64, u64),
{
    let result = copy_with_progress(reader, path, total_size, on_progress);
    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

fn copy_with_progress<R, F>(mut reader: R, path: &Path, total_size: u64, on_progress: F) -> Result<u64, String>
where
    R: Read,
    F: Fn(u64, u64),
{
    let mut file = fs::File::create(path).map_err(|e| format!("Failed to create file: {}", e))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];
    let mut last_progress_update = std::time::Instant::now();

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| format!("Failed to read response: {}", e))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| format!("Failed to write file: {}", e))?;

        downloaded += bytes_read as u64;

        if last_progress_update.elapsed().as_millis() >= 100 {
            on_progress(downloaded, total_size);
            last_progress_update = std::time::Instant::now();
        }
    }

    on_progress(downloaded, total_size);
    Ok(downloaded)
}

fn gunzip(archive: &Path, dest: &Path) -> Result<(), String> {
    let input = fs::File::open(archive).map_err(|e| format!("Failed to open archive: {}", e))?;
    let mut decoder = GzDecoder::new(input);

    let temp_path = dest.with_extension("unpack");
    let mut output = fs::File::create(&temp_path)
        .map_err(|e| format!("Failed to create file: {}", e))?;
    std::io::copy(&mut decoder, &mut output)
        .map_err(|e| format!("Failed to decompress {:?}: {}", archive, e))?;

    fs::rename(&temp_path, dest).map_err(|e| format!("Failed to finalize model file: {}", e))
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub tagger_available: bool,
    pub tagger_path: PathBuf,
    pub entities_available: bool,
    pub entities_path: PathBuf,
}

/// Get status of both models
pub fn get_resource_status(tagger_language: &str, entities_repo: &str) -> ResourceStatus {
    ResourceStatus {
        tagger_available: is_tagger_available(tagger_language),
        tagger_path: get_tagger_path(tagger_language),
        entities_available: is_gliner_available(entities_repo),
        entities_path: get_gliner_dir(entities_repo),
    }
}
