// Hitwatch Exporter - Error types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use hitwatch::{ConfigError, HitwatchError};

/// Exporter errors.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error("Monitor error: {0}")]
    Monitor(#[from] HitwatchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No alert threshold given (use --threshold or --config)")]
    MissingThreshold,

    #[error("Invalid log pattern: {0}")]
    Pattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
