//! Application shell: file selection, the single background analysis worker
//! and the UI-thread event queue.
//!
//! The worker never touches the view. It posts [`UiEvent`]s and calls the
//! wake hook; the host then calls [`Shell::pump`] on its UI thread.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::comments::read_comments;
use crate::config::CloudConfig;
use crate::error::AppError;
use crate::frequency::CategoryCounters;
use crate::nlp::{AnalysisProgress, CommentAnalyzer};
use crate::wordcloud::{render_grid, PanelGrid};

pub const LOADING_MESSAGE: &str = "Procesando comentarios...";
pub const BUSY_MESSAGE: &str = "Ya hay un análisis en curso, espere a que termine.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Processing { source: PathBuf },
}

#[derive(Debug)]
pub enum UiEvent {
    Progress(AnalysisProgress),
    Finished(Result<CategoryCounters, AppError>),
}

/// What the shell draws on. Called only from the thread that owns the shell.
pub trait View {
    fn show_loading(&mut self, message: &str);
    fn update_loading(&mut self, progress: &AnalysisProgress);
    fn hide_loading(&mut self);
    /// Short message that does not change the run state.
    fn show_notice(&mut self, message: &str);
    fn show_panels(&mut self, grid: &PanelGrid);
    fn show_error(&mut self, error: &AppError);
}

#[derive(Debug)]
pub enum SelectOutcome {
    /// No file was chosen.
    Cancelled,
    /// An analysis is already running; the selection was ignored.
    Busy,
    Started { comments: usize },
    Failed(AppError),
}

type WakeHook = Arc<dyn Fn() + Send + Sync>;

pub struct Shell<V: View> {
    state: RunState,
    view: V,
    analyzer: Arc<dyn CommentAnalyzer>,
    cloud: CloudConfig,
    sender: Sender<UiEvent>,
    receiver: Receiver<UiEvent>,
    wake: WakeHook,
}

impl<V: View> Shell<V> {
    pub fn new(view: V, analyzer: Arc<dyn CommentAnalyzer>, cloud: CloudConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            state: RunState::Idle,
            view,
            analyzer,
            cloud,
            sender,
            receiver,
            wake: Arc::new(|| {}),
        }
    }

    /// Called from the worker after every posted event.
    pub fn with_wake_hook<F>(mut self, wake: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.wake = Arc::new(wake);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, RunState::Processing { .. })
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Handle the result of the file dialog.
    pub fn select_file(&mut self, path: Option<PathBuf>) -> SelectOutcome {
        let Some(path) = path else {
            return SelectOutcome::Cancelled;
        };

        if let RunState::Processing { source } = &self.state {
            warn!(
                "Ignoring {:?}: still processing {:?}",
                path, source
            );
            self.view.show_notice(BUSY_MESSAGE);
            return SelectOutcome::Busy;
        }

        let comments = match read_comments(&path) {
            Ok(comments) => comments,
            Err(err) => {
                error!("Could not read {:?}: {}", path, err);
                self.view.show_error(&err);
                return SelectOutcome::Failed(err);
            }
        };

        let count = comments.len();
        let analyzer = Arc::clone(&self.analyzer);
        let sender = self.sender.clone();
        let wake = Arc::clone(&self.wake);

        let spawned = thread::Builder::new()
            .name("analysis-worker".to_string())
            .spawn(move || {
                let result = analyzer.analyze(&comments, &mut |progress| {
                    let _ = sender.send(UiEvent::Progress(progress));
                    wake();
                });
                let _ = sender.send(UiEvent::Finished(result));
                wake();
            });

        if let Err(err) = spawned {
            let err = AppError::from(err);
            self.view.show_error(&err);
            return SelectOutcome::Failed(err);
        }

        info!("Analyzing {} comments from {:?}", count, path);
        self.state = RunState::Processing { source: path };
        self.view.show_loading(LOADING_MESSAGE);
        SelectOutcome::Started { comments: count }
    }

    /// Apply every queued event. Must run on the thread that owns the view.
    pub fn pump(&mut self) {
        while let Ok(event) = self.receiver.try_recv() {
            self.apply(event);
        }
    }

    /// Block until the running analysis finishes or `timeout` elapses.
    /// Returns `true` when the shell is idle afterwards.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_processing() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        !self.is_processing()
    }

    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Progress(progress) => {
                if self.is_processing() {
                    self.view.update_loading(&progress);
                }
            }
            UiEvent::Finished(Ok(counters)) => {
                let grid = render_grid(&counters, &self.cloud);
                self.view.show_panels(&grid);
                self.view.hide_loading();
                self.state = RunState::Idle;
            }
            UiEvent::Finished(Err(err)) => {
                error!("Analysis failed: {}", err);
                self.view.hide_loading();
                self.view.show_error(&err);
                self.state = RunState::Idle;
            }
        }
    }
}
