//! Backend that shells out to an operator-configured converter.
//!
//! The command line comes from `CONVERSION_COMMAND`, e.g.
//! `docx2pdf {input} {output}` or a desktop automation script. `{input}` is
//! replaced with the DOCX path and `{output}` with the expected PDF path.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use super::process::{read_pdf, run_with_timeout};
use super::{ConversionError, ConversionInput, ConversionStrategy, ConvertedDocument};

const INPUT_MARKER: &str = "{input}";
const OUTPUT_MARKER: &str = "{output}";
const OUTPUT_FILE: &str = "converted.pdf";

pub struct CommandConverter {
    /// Program followed by its arguments.
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandConverter {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    fn expand(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace(INPUT_MARKER, &input)
                    .replace(OUTPUT_MARKER, &output)
            })
            .collect()
    }
}

#[async_trait]
impl ConversionStrategy for CommandConverter {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn convert(&self, input: &ConversionInput<'_>) -> Result<ConvertedDocument, ConversionError> {
        let output_path = input.work_dir.join(OUTPUT_FILE);
        let argv = self.expand(input.source_path, &output_path);
        let Some((program, args)) = argv.split_first() else {
            return Err(ConversionError::Unavailable(self.name().to_string()));
        };

        let mut command = Command::new(program);
        command.args(args).current_dir(input.work_dir);
        run_with_timeout(command, program, self.timeout).await?;

        let pdf = read_pdf(&output_path).await?;
        Ok(ConvertedDocument {
            pdf,
            backend: self.name(),
        })
    }
}
