// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser registry: project format detection and parsing.
//!
//! Parsers are tried in registration order and the first whose `detect`
//! answers wins, so more specific formats must be registered first. v1
//! ships only the compose parser; adding `devcontainer` or `procfile`
//! later is a registry change, not a caller change.

pub mod compose;

use crate::description::EnvironmentDescription;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no known project format detected in {0}")]
    NoParser(std::path::PathBuf),
    #[error("unknown project format tag {0:?}")]
    UnknownFormat(String),
    #[error("{format} parse failed: {message}")]
    Parse { format: &'static str, message: String },
    #[error("failed to read project: {0}")]
    Io(#[from] std::io::Error),
}

/// One project format: detection plus parsing.
pub trait Parser: Send + Sync {
    /// Format tag, e.g. `compose`
    fn format(&self) -> &'static str;

    /// Does this directory contain the artifacts this parser recognizes?
    fn detect(&self, dir: &Path) -> bool;

    fn parse(&self, dir: &Path) -> Result<EnvironmentDescription, EngineError>;
}

/// Ordered parser lookup.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self { parsers: Vec::new() }
    }

    /// Registry with the built-in formats.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(compose::ComposeParser::new()));
        registry
    }

    /// Order matters: more specific parsers go first.
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    /// First parser that detects the directory.
    pub fn detect(&self, dir: &Path) -> Option<&dyn Parser> {
        self.parsers.iter().find(|p| p.detect(dir)).map(|p| p.as_ref())
    }

    /// Look up a parser by its format tag.
    pub fn by_format(&self, format: &str) -> Option<&dyn Parser> {
        self.parsers.iter().find(|p| p.format() == format).map(|p| p.as_ref())
    }

    /// Detect and parse in one step.
    pub fn parse(&self, dir: &Path) -> Result<EnvironmentDescription, EngineError> {
        let parser = self.detect(dir).ok_or_else(|| EngineError::NoParser(dir.to_path_buf()))?;
        parser.parse(dir)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
