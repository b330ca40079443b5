pub mod comments;
pub mod config;
pub mod error;
pub mod frequency;
pub mod models;
pub mod ner;
pub mod nlp;
pub mod resources;
pub mod sanitize;
pub mod shell;
pub mod tagger;
pub mod wordcloud;

#[cfg(feature = "desktop")]
mod desktop;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use comments::read_comments;
pub use config::Config;
pub use error::AppError;
pub use frequency::{aggregate, aggregate_all, Category, CategoryCounters, FrequencyCounter};
pub use nlp::{AnnotatedDocument, CommentAnalyzer, NlpPipeline};
pub use sanitize::Sanitizer;
pub use shell::{RunState, SelectOutcome, Shell, View};
pub use wordcloud::{render, render_grid, PanelGrid, RenderedPanel};

#[cfg(feature = "desktop")]
pub use desktop::run;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("comment_cloud_lib=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
