//! DOCX template handling.
//!
//! - `model` - loading, indexing and saving a DOCX package
//! - `substitute` - placeholder replacement across split runs
//! - `placeholders` - mapping an estimate onto template tokens

pub mod model;
pub mod placeholders;
pub mod substitute;

pub use model::{Paragraph, Run, RunStyle, TemplateDocument, TextContainer};
pub use placeholders::build_placeholder_map;
pub use substitute::{find_unreplaced_tokens, replace_placeholders, SubstitutionReport};

use thiserror::Error;

/// Errors raised while reading or writing a DOCX package.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid DOCX archive: {0}")]
    Archive(String),
    #[error("DOCX package has no {0} part")]
    MissingPart(String),
    #[error("malformed XML in {part} at byte {position}: {message}")]
    Xml {
        part: String,
        position: usize,
        message: String,
    },
    #[error("failed to write {part}: {message}")]
    Unwritable { part: String, message: String },
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(err: zip::result::ZipError) -> Self {
        DocumentError::Archive(err.to_string())
    }
}
