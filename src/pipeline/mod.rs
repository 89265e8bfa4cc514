//! Estimate document generation.
//!
//! One call to [`EstimatePipeline::generate`] walks a request through
//! `load_template -> substitute -> persist_transient -> convert -> respond`,
//! with cleanup of the request workspace on every path out. A missing or
//! unreadable template is the only fatal outcome besides a malformed
//! template; conversion problems degrade to a DOCX download.

pub mod context;

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

use crate::config::AppConfig;
use crate::convert::{
    ConversionChain, ConversionError, ConversionInput, ConvertedDocument, PDF_CONTENT_TYPE,
};
use crate::document::placeholders::current_year;
use crate::document::{
    build_placeholder_map, find_unreplaced_tokens, replace_placeholders, DocumentError,
    TemplateDocument,
};
use crate::estimate::model::Estimate;

pub use context::{RequestContext, Stage};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Shown to the user when the PDF could not be produced.
pub const FALLBACK_WARNING: &str = "PDF conversion failed. Downloading DOCX file instead.";

const WORKSPACE_PREFIX: &str = "estimate-";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The letterpad template is not deployed where the configuration says.
    #[error("estimate template not found at {0}")]
    TemplateMissing(PathBuf),
    #[error("failed to read estimate template {path}: {source}")]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("estimate template could not be processed: {0}")]
    Substitution(#[from] DocumentError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => PDF_CONTENT_TYPE,
            DocumentFormat::Docx => DOCX_CONTENT_TYPE,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

/// The file handed back to the user.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub format: DocumentFormat,
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Set when the response is a degraded DOCX instead of a PDF.
    pub warning: Option<String>,
    /// Conversion backend that produced the PDF.
    pub backend: Option<&'static str>,
}

impl GeneratedDocument {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Request-scoped scratch directory. Removed on `close`, or on drop when the
/// request is abandoned midway.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn create() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()?;
        Ok(Self { dir })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn close(self, context: &RequestContext) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => log::debug!(
                "{} stage={} removed workspace {}",
                context,
                Stage::Cleanup,
                path.display()
            ),
            Err(e) => log::error!(
                "{} stage={} failed to remove workspace {}: {}",
                context,
                Stage::Cleanup,
                path.display(),
                e
            ),
        }
    }
}

pub struct EstimatePipeline {
    template_path: PathBuf,
    file_prefix: String,
    chain: ConversionChain,
}

impl EstimatePipeline {
    pub fn new(
        template_path: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        chain: ConversionChain,
    ) -> Self {
        Self {
            template_path: template_path.into(),
            file_prefix: file_prefix.into(),
            chain,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.template_path.clone(),
            config.file_prefix.clone(),
            ConversionChain::from_config(&config.conversion),
        )
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.chain.backend_names()
    }

    /// `<PREFIX>-ESTIMATE-<party name>.<ext>`, with the party name made safe
    /// for use as a file name.
    pub fn download_filename(&self, party_name: &str, format: DocumentFormat) -> String {
        let party = sanitize_filename::sanitize(party_name.trim());
        let party = if party.trim().is_empty() {
            "estimate".to_string()
        } else {
            party
        };
        format!(
            "{}-ESTIMATE-{}.{}",
            self.file_prefix,
            party,
            format.extension()
        )
    }

    /// Produce the estimate document for `estimate`.
    pub async fn generate(
        &self,
        context: &RequestContext,
        estimate: &Estimate,
        paver_block_type: &str,
    ) -> Result<GeneratedDocument, PipelineError> {
        log::info!(
            "{} stage={} reading {}",
            context,
            Stage::LoadTemplate,
            self.template_path.display()
        );
        let template = self.load_template(context).await?;

        let docx = self
            .substitute(context, &template, estimate, paver_block_type)
            .map_err(|e| {
                log::error!("{} stage={} {}", context, Stage::Substitute, e);
                PipelineError::Substitution(e)
            })?;

        let document = match self.convert(context, estimate, &docx).await {
            Ok(converted) => {
                log::info!(
                    "{} stage={} responding with PDF from backend '{}' ({} bytes)",
                    context,
                    Stage::Respond,
                    converted.backend,
                    converted.pdf.len()
                );
                GeneratedDocument {
                    format: DocumentFormat::Pdf,
                    filename: self.download_filename(&estimate.party_name, DocumentFormat::Pdf),
                    bytes: converted.pdf,
                    warning: None,
                    backend: Some(converted.backend),
                }
            }
            Err(e) => {
                log::warn!(
                    "{} stage={} PDF conversion failed, responding with DOCX: {}",
                    context,
                    Stage::Convert,
                    e
                );
                GeneratedDocument {
                    format: DocumentFormat::Docx,
                    filename: self.download_filename(&estimate.party_name, DocumentFormat::Docx),
                    bytes: docx,
                    warning: Some(FALLBACK_WARNING.to_string()),
                    backend: None,
                }
            }
        };

        Ok(document)
    }

    async fn load_template(&self, context: &RequestContext) -> Result<Vec<u8>, PipelineError> {
        match tokio::fs::read(&self.template_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::error!(
                    "{} stage={} template missing at {}",
                    context,
                    Stage::LoadTemplate,
                    self.template_path.display()
                );
                Err(PipelineError::TemplateMissing(self.template_path.clone()))
            }
            Err(e) => {
                log::error!(
                    "{} stage={} failed to read template: {}",
                    context,
                    Stage::LoadTemplate,
                    e
                );
                Err(PipelineError::TemplateIo {
                    path: self.template_path.clone(),
                    source: e,
                })
            }
        }
    }

    fn substitute(
        &self,
        context: &RequestContext,
        template: &[u8],
        estimate: &Estimate,
        paver_block_type: &str,
    ) -> Result<Vec<u8>, DocumentError> {
        let mut document = TemplateDocument::from_bytes(template)?;
        let placeholders = build_placeholder_map(estimate, paver_block_type, current_year());
        let report = replace_placeholders(&mut document, &placeholders);
        log::info!(
            "{} stage={} replaced {} placeholder(s) in {} container(s)",
            context,
            Stage::Substitute,
            report.replaced,
            report.containers_changed
        );

        let leftovers = find_unreplaced_tokens(&document.text());
        if !leftovers.is_empty() {
            log::warn!(
                "{} stage={} template still contains unreplaced tokens: {}",
                context,
                Stage::Substitute,
                leftovers.join(", ")
            );
        }

        document.to_bytes()
    }

    /// Write the DOCX into a fresh workspace and run the conversion chain.
    /// The workspace is removed before returning, whatever the outcome.
    async fn convert(
        &self,
        context: &RequestContext,
        estimate: &Estimate,
        docx: &[u8],
    ) -> Result<ConvertedDocument, ConversionError> {
        let workspace = Workspace::create().map_err(|e| {
            log::error!(
                "{} stage={} failed to create workspace: {}",
                context,
                Stage::PersistTransient,
                e
            );
            ConversionError::Io(e)
        })?;

        let result = self.convert_in(context, estimate, docx, workspace.path()).await;
        workspace.close(context);
        result
    }

    async fn convert_in(
        &self,
        context: &RequestContext,
        estimate: &Estimate,
        docx: &[u8],
        work_dir: &Path,
    ) -> Result<ConvertedDocument, ConversionError> {
        let source_path = work_dir.join(format!("estimate-{}.docx", estimate.id));
        tokio::fs::write(&source_path, docx).await.map_err(|e| {
            log::error!(
                "{} stage={} failed to write {}: {}",
                context,
                Stage::PersistTransient,
                source_path.display(),
                e
            );
            ConversionError::Io(e)
        })?;

        log::info!(
            "{} stage={} backends {:?}",
            context,
            Stage::Convert,
            self.chain.backend_names()
        );
        let input = ConversionInput {
            source: docx,
            source_path: &source_path,
            work_dir,
        };
        self.chain.convert(&input, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{BuiltinConverter, ConversionStrategy, DisabledConverter};
    use crate::document::test_support::{docx, paragraph_xml, table_xml};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn estimate() -> Estimate {
        Estimate {
            id: 7,
            party_name: "Acme Co".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            paver_block_type_id: 1,
            price: dec("1000.00"),
            gst_percentage: dec("18.00"),
            gst_amount: dec("180.00"),
            transportation_charge: dec("200.00"),
            loading_unloading_cost: dec("100.00"),
            total_amount: dec("1480.00"),
            notes: "Deliver before noon".to_string(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn template_bytes() -> Vec<u8> {
        let body = format!(
            "{}{}{}",
            paragraph_xml(&[("Dear <part", ""), ("yname>,", "<w:b/>")]),
            table_xml(&[
                vec![vec!["Paver block"], vec!["<paverblocktype>"]],
                vec![vec!["Total"], vec!["<rate>"]],
            ]),
            paragraph_xml(&[("Note: <NOTE>", "")])
        );
        docx(&body)
    }

    fn write_template(dir: &Path) -> PathBuf {
        let path = dir.join("KCP_LETTERPAD.docx");
        std::fs::write(&path, template_bytes()).unwrap();
        path
    }

    fn context() -> RequestContext {
        RequestContext::new(Uuid::new_v4(), 7)
    }

    /// Records the workspace it was given, then fails.
    struct Failing {
        seen: Arc<Mutex<Option<PathBuf>>>,
    }

    #[async_trait]
    impl ConversionStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn convert(&self, input: &ConversionInput<'_>) -> Result<ConvertedDocument, ConversionError> {
            assert!(input.source_path.exists());
            *self.seen.lock().unwrap() = Some(input.work_dir.to_path_buf());
            Err(ConversionError::Render("backend crashed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_generates_pdf_with_builtin_backend() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = EstimatePipeline::new(
            write_template(dir.path()),
            "KCP",
            ConversionChain::new(vec![Box::new(BuiltinConverter::default())]),
        );

        let document = pipeline
            .generate(&context(), &estimate(), "Zig-Zag 60mm")
            .await
            .unwrap();

        assert_eq!(document.format, DocumentFormat::Pdf);
        assert_eq!(document.content_type(), "application/pdf");
        assert_eq!(document.filename, "KCP-ESTIMATE-Acme Co.pdf");
        assert!(document.warning.is_none());
        assert_eq!(document.backend, Some("builtin"));
        assert!(document.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_conversion_failure_falls_back_to_docx() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let pipeline = EstimatePipeline::new(
            write_template(dir.path()),
            "KCP",
            ConversionChain::new(vec![Box::new(Failing { seen: seen.clone() })]),
        );

        let document = pipeline
            .generate(&context(), &estimate(), "Zig-Zag 60mm")
            .await
            .unwrap();

        assert_eq!(document.format, DocumentFormat::Docx);
        assert_eq!(document.content_type(), DOCX_CONTENT_TYPE);
        assert_eq!(document.filename, "KCP-ESTIMATE-Acme Co.docx");
        assert_eq!(document.warning.as_deref(), Some(FALLBACK_WARNING));

        let substituted = TemplateDocument::from_bytes(&document.bytes).unwrap();
        let text = substituted.text();
        assert!(text.contains("Dear Acme Co,"));
        assert!(text.contains("Paver block | Zig-Zag 60mm"));
        assert!(text.contains("Total | 1480.00"));
        assert!(text.contains("Note: Deliver before noon"));
        assert!(find_unreplaced_tokens(&text).is_empty());

        let workspace = seen.lock().unwrap().clone().unwrap();
        assert!(!workspace.exists(), "workspace must be removed after failure");
    }

    #[tokio::test]
    async fn test_workspace_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let pipeline = EstimatePipeline::new(
            write_template(dir.path()),
            "KCP",
            ConversionChain::new(vec![
                Box::new(Failing { seen: seen.clone() }),
                Box::new(BuiltinConverter::default()),
            ]),
        );

        let document = pipeline
            .generate(&context(), &estimate(), "Plain")
            .await
            .unwrap();
        assert_eq!(document.format, DocumentFormat::Pdf);

        let workspace = seen.lock().unwrap().clone().unwrap();
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn test_disabled_conversion_returns_docx() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = EstimatePipeline::new(
            write_template(dir.path()),
            "KCP",
            ConversionChain::new(vec![Box::new(DisabledConverter)]),
        );
        let document = pipeline
            .generate(&context(), &estimate(), "Plain")
            .await
            .unwrap();
        assert_eq!(document.format, DocumentFormat::Docx);
        assert!(document.warning.is_some());
    }

    #[tokio::test]
    async fn test_missing_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let pipeline = EstimatePipeline::new(
            dir.path().join("missing.docx"),
            "KCP",
            ConversionChain::new(vec![Box::new(Failing { seen: seen.clone() })]),
        );

        let err = pipeline
            .generate(&context(), &estimate(), "Plain")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TemplateMissing(_)));
        assert!(seen.lock().unwrap().is_none(), "no conversion may be attempted");
    }

    #[tokio::test]
    async fn test_malformed_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        let pipeline = EstimatePipeline::new(
            path,
            "KCP",
            ConversionChain::new(vec![Box::new(BuiltinConverter::default())]),
        );

        let err = pipeline
            .generate(&context(), &estimate(), "Plain")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Substitution(_)));
    }

    #[test]
    fn test_download_filename() {
        let pipeline = EstimatePipeline::new("t.docx", "KCP", ConversionChain::new(Vec::new()));
        assert_eq!(
            pipeline.download_filename("Acme Co", DocumentFormat::Pdf),
            "KCP-ESTIMATE-Acme Co.pdf"
        );
        assert_eq!(
            pipeline.download_filename("a/b:c", DocumentFormat::Docx),
            "KCP-ESTIMATE-abc.docx"
        );
        assert_eq!(
            pipeline.download_filename("  ", DocumentFormat::Pdf),
            "KCP-ESTIMATE-estimate.pdf"
        );
    }
}
