//! In-process DOCX to PDF renderer.
//!
//! Needs no external software. `pdf_oxide` lays out the body paragraphs and
//! tables on A4 pages with the standard PDF fonts. Header and footer parts,
//! exact fonts and column layout are not reproduced; deployments that need a
//! faithful letterpad put `soffice` ahead of it in the chain.

use async_trait::async_trait;
use pdf_oxide::converters::office::{Margins, OfficeConfig, OfficeConverter};

use super::{ensure_pdf, ConversionError, ConversionInput, ConversionStrategy, ConvertedDocument};

/// Page margin in points (about 2 cm).
const MARGIN: f32 = 56.0;

#[derive(Debug, Clone)]
pub struct BuiltinConverter {
    config: OfficeConfig,
}

impl Default for BuiltinConverter {
    fn default() -> Self {
        Self {
            config: OfficeConfig {
                margins: Margins::uniform(MARGIN),
                ..OfficeConfig::a4()
            },
        }
    }
}

impl BuiltinConverter {
    /// Render DOCX bytes to a PDF. Blocking; callers on the runtime go
    /// through [`ConversionStrategy::convert`].
    pub fn render(&self, docx: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let pdf = OfficeConverter::with_config(self.config.clone())
            .convert_docx_bytes(docx)
            .map_err(|e| ConversionError::Render(e.to_string()))?;
        ensure_pdf(&pdf)?;
        Ok(pdf)
    }
}

#[async_trait]
impl ConversionStrategy for BuiltinConverter {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn convert(&self, input: &ConversionInput<'_>) -> Result<ConvertedDocument, ConversionError> {
        let source = input.source.to_vec();
        let renderer = self.clone();
        let pdf = tokio::task::spawn_blocking(move || renderer.render(&source))
            .await
            .map_err(|e| ConversionError::Render(e.to_string()))??;

        Ok(ConvertedDocument {
            pdf,
            backend: self.name(),
        })
    }
}
