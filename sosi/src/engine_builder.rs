use std::path::{Path, PathBuf};

use crate::engine_config::EngineConfig;
use crate::errors::{SosiError, SosiResult};
use crate::selection::SelectionEngine;

enum RuleSource {
    Text(String),
    File(PathBuf),
}

/// Fluent construction of a [`SelectionEngine`].
///
/// The first failing setting is kept and returned by [`build`](Self::build).
///
/// ```rust
/// use sosi::SelectionEngineBuilder;
///
/// let engine = SelectionEngineBuilder::new()
///     .cancel_poll_interval(64)
///     .rules_from_text(".GRUPPE-UTVALG Road\n..VELG ..OBJTYPE = Veg\n..BRUK-REGEL ROAD\n")
///     .build()
///     .unwrap();
/// assert_eq!(engine.rules().rule_names(), vec!["Road"]);
/// ```
#[derive(Default)]
pub struct SelectionEngineBuilder {
    error: Option<SosiError>,
    config: EngineConfig,
    sources: Vec<RuleSource>,
}

impl SelectionEngineBuilder {
    pub fn new() -> Self {
        SelectionEngineBuilder {
            error: None,
            config: EngineConfig::new(),
            sources: Vec::new(),
        }
    }

    pub fn cancel_poll_interval(mut self, interval: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_cancel_poll_interval(interval) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_stop_on_first_error(stop) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Queues rule text to load during [`build`](Self::build).
    pub fn rules_from_text(mut self, text: &str) -> Self {
        self.sources.push(RuleSource::Text(text.to_string()));
        self
    }

    /// Queues a rule file to load during [`build`](Self::build).
    pub fn rules_from_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources
            .push(RuleSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Builds the engine and loads the queued rule sources in order.
    ///
    /// Malformed rules end up in [`SelectionEngine::parse_report`].
    /// Only configuration and file access errors fail the build.
    pub fn build(self) -> SosiResult<SelectionEngine> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut engine = SelectionEngine::new(self.config);
        for source in self.sources {
            match source {
                RuleSource::Text(text) => {
                    engine.load_rules_from_text(&text);
                }
                RuleSource::File(path) => {
                    engine.load_rules_from_file(&path)?;
                }
            }
        }
        Ok(engine)
    }
}
