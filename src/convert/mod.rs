//! DOCX to PDF conversion backends.
//!
//! A backend turns the substituted DOCX into PDF bytes. Backends are
//! configured as an ordered chain; the first one that succeeds wins and
//! the caller decides what to do when all of them fail.
//!
//! - `office` - headless office suite (`soffice --convert-to pdf`)
//! - `command` - arbitrary external converter command
//! - `builtin` - in-process renderer built on `pdf_oxide`
//! - `none` - always unavailable, forces the DOCX fallback

pub mod builtin;
pub mod command;
pub mod office;
pub mod process;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::{BackendKind, ConversionConfig};

pub use builtin::BuiltinConverter;
pub use command::CommandConverter;
pub use office::SofficeConverter;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Errors a conversion backend can report. None of them is fatal to a
/// request; the pipeline falls back to the DOCX.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("conversion backend '{0}' is disabled")]
    Unavailable(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not finish within {}s and was killed", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with status {code:?}: {stderr}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("converter produced no output at {0}")]
    MissingOutput(PathBuf),
    #[error("converter output is not a PDF: {0}")]
    InvalidOutput(String),
    #[error("failed to render PDF: {0}")]
    Render(String),
    #[error("conversion I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no conversion backend configured")]
    NoBackends,
    #[error("all conversion backends failed: {}", .0.join("; "))]
    AllFailed(Vec<String>),
}

/// What a backend gets to work with for one request.
pub struct ConversionInput<'a> {
    /// The substituted DOCX.
    pub source: &'a [u8],
    /// The same bytes, already written to the request workspace.
    pub source_path: &'a Path,
    /// Request-scoped scratch directory, removed by the caller.
    pub work_dir: &'a Path,
}

/// Successful conversion.
#[derive(Debug)]
pub struct ConvertedDocument {
    pub pdf: Vec<u8>,
    /// Name of the backend that produced it.
    pub backend: &'static str,
}

/// A single conversion backend.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn convert(&self, input: &ConversionInput<'_>) -> Result<ConvertedDocument, ConversionError>;
}

/// Backend that never converts.
pub struct DisabledConverter;

#[async_trait]
impl ConversionStrategy for DisabledConverter {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn convert(&self, _input: &ConversionInput<'_>) -> Result<ConvertedDocument, ConversionError> {
        Err(ConversionError::Unavailable(self.name().to_string()))
    }
}

/// Reject converter output that is not a PDF file.
pub fn ensure_pdf(bytes: &[u8]) -> Result<(), ConversionError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else if bytes.is_empty() {
        Err(ConversionError::InvalidOutput("empty file".to_string()))
    } else {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(16)]).into_owned();
        Err(ConversionError::InvalidOutput(format!(
            "unexpected header {:?}",
            head
        )))
    }
}

/// Ordered list of backends, tried until one succeeds.
pub struct ConversionChain {
    backends: Vec<Box<dyn ConversionStrategy>>,
}

impl ConversionChain {
    pub fn new(backends: Vec<Box<dyn ConversionStrategy>>) -> Self {
        Self { backends }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        let backends = config
            .backends
            .iter()
            .map(|kind| -> Box<dyn ConversionStrategy> {
                match kind {
                    BackendKind::Soffice => Box::new(SofficeConverter::new(
                        config.soffice_bin.clone(),
                        config.timeout,
                    )),
                    BackendKind::Command => Box::new(CommandConverter::new(
                        config.command.clone(),
                        config.timeout,
                    )),
                    BackendKind::Builtin => Box::new(BuiltinConverter::default()),
                    BackendKind::None => Box::new(DisabledConverter),
                }
            })
            .collect();
        Self::new(backends)
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }

    /// Try each backend in order. `context` prefixes the log lines.
    pub async fn convert(
        &self,
        input: &ConversionInput<'_>,
        context: &(dyn std::fmt::Display + Sync),
    ) -> Result<ConvertedDocument, ConversionError> {
        if self.backends.is_empty() {
            return Err(ConversionError::NoBackends);
        }

        let mut failures = Vec::new();
        for backend in &self.backends {
            log::debug!("{} converting with backend '{}'", context, backend.name());
            match backend.convert(input).await {
                Ok(document) => return Ok(document),
                Err(err) => {
                    log::warn!(
                        "{} conversion backend '{}' failed: {}",
                        context,
                        backend.name(),
                        err
                    );
                    failures.push((backend.name(), err));
                }
            }
        }

        if failures.len() == 1 {
            if let Some((_, err)) = failures.pop() {
                return Err(err);
            }
        }
        Err(ConversionError::AllFailed(
            failures
                .into_iter()
                .map(|(name, err)| format!("{}: {}", name, err))
                .collect(),
        ))
    }
}
