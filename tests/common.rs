#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use paver_estimate_server::auth::generate_access_token;
use paver_estimate_server::convert::{
    BuiltinConverter, ConversionChain, ConversionStrategy, DisabledConverter,
};
use paver_estimate_server::db::{AppState, MemoryStore, Store};
use paver_estimate_server::pipeline::EstimatePipeline;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// A letterpad with placeholders split across runs, one in bold, and a
/// pricing table.
const LETTERPAD_BODY: &str = concat!(
    r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>ESTIMATE</w:t></w:r></w:p>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">To: &lt;party</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>name&gt;</w:t></w:r></w:p>"#,
    r#"<w:p><w:r><w:t>Date: &lt;date&gt;</w:t></w:r></w:p>"#,
    r#"<w:tbl>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>&lt;paverblocktype&gt;</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>&lt;rate1&gt;</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>GST</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>&lt;rate2&gt;</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>Transport</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>&lt;rate4&gt;</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>Loading</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>&lt;rate5&gt;</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>Total</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>&lt;rate&gt;</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"</w:tbl>"#,
    r#"<w:p><w:r><w:t>Note: &lt;NOTE&gt;</w:t></w:r></w:p>"#,
    r#"<w:p><w:r><w:t>&lt;year&gt;</w:t></w:r></w:p>"#,
);

pub fn letterpad_docx() -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        LETTERPAD_BODY
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("word/document.xml", document.as_str()),
    ] {
        writer
            .start_file(name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Template directory plus the state serving from it. Keep the `TempDir`
/// alive for the duration of the test.
pub struct TestEnv {
    pub dir: TempDir,
    pub state: AppState,
}

impl TestEnv {
    pub fn template_path(&self) -> PathBuf {
        self.dir.path().join("KCP_LETTERPAD.docx")
    }
}

fn env_with(backends: Vec<Box<dyn ConversionStrategy>>, install_template: bool) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("KCP_LETTERPAD.docx");
    if install_template {
        std::fs::write(&template, letterpad_docx()).unwrap();
    }
    let pipeline = EstimatePipeline::new(&template, "KCP", ConversionChain::new(backends));
    let state = AppState::new(Arc::new(MemoryStore::new()), pipeline);
    TestEnv { dir, state }
}

/// PDFs rendered in-process.
pub fn builtin_env() -> TestEnv {
    env_with(vec![Box::new(BuiltinConverter::default())], true)
}

/// Every conversion fails, so responses fall back to DOCX.
pub fn docx_only_env() -> TestEnv {
    env_with(vec![Box::new(DisabledConverter)], true)
}

pub fn missing_template_env() -> TestEnv {
    env_with(vec![Box::new(BuiltinConverter::default())], false)
}

pub fn path_exists(path: &Path) -> bool {
    path.exists()
}

/// Create a user directly in the store and return `Bearer <token>`.
pub async fn bearer_for(state: &AppState, username: &str) -> String {
    let user = state.store.create_user(username, "unused-hash").await.unwrap();
    let token = generate_access_token(&user.id.to_string(), &user.username).unwrap();
    format!("Bearer {}", token)
}
