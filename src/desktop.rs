use serde::Serialize;
use std::sync::{Arc, Mutex};
use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_dialog::DialogExt;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::frequency::Category;
use crate::nlp::{AnalysisProgress, NlpPipeline};
use crate::resources::{self, ResourceStatus};
use crate::shell::{SelectOutcome, Shell, View};
use crate::wordcloud::PanelGrid;

pub struct AppState {
    pub shell: Mutex<Shell<TauriView>>,
    pub config: Config,
}

/// Forwards view updates to the webview as events.
pub struct TauriView {
    app: AppHandle,
}

#[derive(Serialize, Clone)]
struct LoadingPayload {
    visible: bool,
    message: Option<String>,
    progress: Option<u8>, // 0-100
    detail: Option<String>,
}

#[derive(Serialize, Clone)]
struct PanelPayload {
    category: Option<Category>,
    title: String,
    blank: bool,
    svg: String,
}

#[derive(Serialize, Clone)]
struct PanelsPayload {
    columns: usize,
    panels: Vec<PanelPayload>,
}

#[derive(Serialize, Clone)]
struct ErrorPayload {
    kind: &'static str,
    message: String,
}

impl TauriView {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            warn!("Failed to emit '{}': {}", event, e);
        }
    }

    fn loading(&self, message: Option<String>, progress: Option<u8>, detail: Option<String>) {
        self.emit(
            "loading",
            LoadingPayload {
                visible: true,
                message,
                progress,
                detail,
            },
        );
    }
}

impl View for TauriView {
    fn show_loading(&mut self, message: &str) {
        self.loading(Some(message.to_string()), None, None);
    }

    fn update_loading(&mut self, progress: &AnalysisProgress) {
        self.loading(
            Some(progress.stage.clone()),
            Some(progress.progress),
            progress.detail.clone(),
        );
    }

    fn hide_loading(&mut self) {
        self.emit(
            "loading",
            LoadingPayload {
                visible: false,
                message: None,
                progress: None,
                detail: None,
            },
        );
    }

    fn show_notice(&mut self, message: &str) {
        self.emit("notice", message.to_string());
    }

    fn show_panels(&mut self, grid: &PanelGrid) {
        let panels = grid
            .panels
            .iter()
            .map(|panel| PanelPayload {
                category: panel.category,
                title: panel.title.clone(),
                blank: panel.is_blank(),
                svg: panel.to_svg(),
            })
            .collect();
        self.emit(
            "panels",
            PanelsPayload {
                columns: grid.columns,
                panels,
            },
        );
    }

    fn show_error(&mut self, error: &AppError) {
        self.emit(
            "analysis-error",
            ErrorPayload {
                kind: error.kind(),
                message: error.to_string(),
            },
        );
    }
}

/// Lock the shell and apply queued worker events. Runs on the main thread.
fn pump(app: &AppHandle) {
    let state = app.state::<AppState>();
    match state.shell.lock() {
        Ok(mut shell) => shell.pump(),
        Err(e) => error!("Shell lock poisoned: {}", e),
    };
}

#[tauri::command]
fn select_csv(app: AppHandle) {
    let handle = app.clone();
    app.dialog()
        .file()
        .add_filter("CSV Files", &["csv"])
        .pick_file(move |file| {
            let path = file.and_then(|f| match f.into_path() {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Unsupported file selection: {}", e);
                    None
                }
            });
            let main = handle.clone();
            let scheduled = handle.run_on_main_thread(move || {
                let state = main.state::<AppState>();
                let outcome = match state.shell.lock() {
                    Ok(mut shell) => shell.select_file(path),
                    Err(e) => {
                        error!("Shell lock poisoned: {}", e);
                        return;
                    }
                };
                match outcome {
                    SelectOutcome::Started { comments } => {
                        info!("Started analysis of {} comments", comments)
                    }
                    SelectOutcome::Busy => info!("Selection ignored while busy"),
                    _ => {}
                }
            });
            if let Err(e) = scheduled {
                error!("Failed to schedule file selection: {}", e);
            }
        });
}

#[tauri::command]
fn model_status(state: tauri::State<AppState>) -> ResourceStatus {
    resources::get_resource_status(&state.config.models.tagger, &state.config.models.entities)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    crate::init_logging();
    let config = Config::load();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(move |app| {
            let pipeline = NlpPipeline::new(&config)?;
            let handle = app.handle().clone();
            let waker = handle.clone();

            let shell = Shell::new(
                TauriView::new(handle),
                Arc::new(pipeline),
                config.cloud.clone(),
            )
            .with_wake_hook(move || {
                let main = waker.clone();
                if let Err(e) = waker.run_on_main_thread(move || pump(&main)) {
                    error!("Failed to wake UI thread: {}", e);
                }
            });

            app.manage(AppState {
                shell: Mutex::new(shell),
                config: config.clone(),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![select_csv, model_status])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
