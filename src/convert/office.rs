//! Headless office suite backend.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use super::process::{read_pdf, run_with_timeout};
use super::{ConversionError, ConversionInput, ConversionStrategy, ConvertedDocument};

/// Converts with `soffice --headless --convert-to pdf`.
///
/// Each conversion gets its own user profile inside the request workspace;
/// a shared profile is locked by the first running instance and makes
/// concurrent conversions fail.
pub struct SofficeConverter {
    binary: String,
    timeout: Duration,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self, source: &Path, profile: &Path, out_dir: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--norestore")
            .arg("--nolockcheck")
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(source);
        command
    }
}

#[async_trait]
impl ConversionStrategy for SofficeConverter {
    fn name(&self) -> &'static str {
        "soffice"
    }

    async fn convert(&self, input: &ConversionInput<'_>) -> Result<ConvertedDocument, ConversionError> {
        let out_dir = input.work_dir.join("pdf");
        let profile = input.work_dir.join("soffice-profile");
        tokio::fs::create_dir_all(&out_dir).await?;

        let command = self.command(input.source_path, &profile, &out_dir);
        run_with_timeout(command, &self.binary, self.timeout).await?;

        let stem = input
            .source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let pdf = read_pdf(&out_dir.join(format!("{}.pdf", stem))).await?;

        Ok(ConvertedDocument {
            pdf,
            backend: self.name(),
        })
    }
}
