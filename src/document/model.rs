//! In-memory model of a DOCX template.
//!
//! A DOCX file is a ZIP archive; the body lives in `word/document.xml`,
//! letterhead content in `word/header*.xml` / `word/footer*.xml`. Each of
//! those parts is kept as a flat list of `quick-xml` events and indexed into
//! paragraphs, runs and table cells. Substitution only edits run text; on
//! save, the text is written back into the `w:t` events it came from and
//! every other event (run properties, paragraph properties, drawings) is
//! emitted unchanged, so formatting survives byte for byte.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::DocumentError;

pub const MAIN_PART: &str = "word/document.xml";

/// Formatting of a run, as far as the template pipeline cares about it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub font_family: Option<String>,
    /// Size in points.
    pub font_size: Option<f32>,
    /// `RRGGBB` hex colour.
    pub color: Option<String>,
}

/// Location of one `w:t` element in the part's event list.
#[derive(Debug, Clone, Copy)]
struct TextSlot {
    start: usize,
    text: Option<usize>,
}

/// A maximal span of text sharing one style (`w:r`).
#[derive(Debug, Clone, Default)]
pub struct Run {
    pub text: String,
    pub style: RunStyle,
    original: String,
    slots: Vec<TextSlot>,
    /// Byte offsets in `text` where the second and later `w:t` slots start.
    breaks: Vec<usize>,
}

impl Run {
    /// Detached run, not backed by any XML. Used to build containers by hand.
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        let text = text.into();
        Self {
            original: text.clone(),
            text,
            style,
            slots: Vec::new(),
            breaks: Vec::new(),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.text != self.original
    }

    /// Replace the byte range `start..end` of the run text with `value`.
    ///
    /// Text on either side keeps its `w:t` slot, so a `w:tab` or `w:br`
    /// between slots stays where it was. Slot boundaries inside the
    /// replaced range move to the end of `value`.
    pub fn replace_range(&mut self, start: usize, end: usize, value: &str) {
        let removed = end - start;
        for offset in &mut self.breaks {
            if *offset <= start {
                continue;
            }
            *offset = if *offset >= end {
                *offset - removed + value.len()
            } else {
                start + value.len()
            };
        }
        self.text.replace_range(start..end, value);
    }

    /// Run text split at its slot boundaries, one entry per slot. `None`
    /// when the boundaries no longer fit the text.
    fn segments(&self) -> Option<Vec<&str>> {
        if self.breaks.len() + 1 != self.slots.len() {
            return None;
        }
        let mut segments = Vec::with_capacity(self.slots.len());
        let mut from = 0;
        let len = self.text.len();
        for &offset in self.breaks.iter().chain(std::iter::once(&len)) {
            segments.push(self.text.get(from..offset)?);
            from = offset;
        }
        Some(segments)
    }

    /// Text to write into each slot. Text of a slot without a text node
    /// (`<w:t></w:t>`) moves to the nearest slot that has one.
    fn slot_values(&self) -> Option<Vec<String>> {
        let mut values = vec![String::new(); self.slots.len()];
        let Some(segments) = self.segments() else {
            let target = self.slots.iter().position(|slot| slot.text.is_some())?;
            values[target] = self.text.clone();
            return Some(values);
        };

        let mut carry = String::new();
        let mut last_text = None;
        for (position, (slot, segment)) in self.slots.iter().zip(segments).enumerate() {
            if slot.text.is_some() {
                values[position] = std::mem::take(&mut carry) + segment;
                last_text = Some(position);
            } else if let Some(previous) = last_text {
                values[previous].push_str(segment);
            } else {
                carry.push_str(segment);
            }
        }
        carry.is_empty().then_some(values)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    /// Logical string of the paragraph.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
    /// Tables nested inside this cell.
    pub tables: Vec<Table>,
}

impl TableCell {
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// Anything whose text is searched as one logical string.
///
/// Both variants reduce to an ordered sequence of runs; a cell's runs are
/// those of all its paragraphs in order.
pub enum TextContainer<'a> {
    Paragraph(&'a mut Paragraph),
    TableCell(&'a mut Vec<Paragraph>),
}

impl<'a> TextContainer<'a> {
    pub fn runs_mut(&mut self) -> Vec<&mut Run> {
        match self {
            TextContainer::Paragraph(paragraph) => paragraph.runs.iter_mut().collect(),
            TextContainer::TableCell(paragraphs) => paragraphs
                .iter_mut()
                .flat_map(|paragraph| paragraph.runs.iter_mut())
                .collect(),
        }
    }

    pub fn is_table_cell(&self) -> bool {
        matches!(self, TextContainer::TableCell(_))
    }
}

/// One parsed XML part of the package.
#[derive(Debug, Clone)]
pub struct XmlPart {
    pub name: String,
    events: Vec<Event<'static>>,
    pub blocks: Vec<Block>,
}

enum Frame {
    Table(Table),
    Row(TableRow),
    Cell(TableCell),
    Paragraph(Paragraph),
    Run(Run),
}

fn is_element(name: &[u8], expected: &[u8]) -> bool {
    name == expected
}

fn attribute_value(element: &BytesStart, key: &str) -> Option<String> {
    element
        .try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// `<w:b/>` is on, `<w:b w:val="0"/>` / `"false"` is off.
fn toggle_on(element: &BytesStart) -> bool {
    !matches!(
        attribute_value(element, "w:val").as_deref(),
        Some("0") | Some("false") | Some("none")
    )
}

fn apply_style_property(style: &mut RunStyle, element: &BytesStart) {
    match element.name().as_ref() {
        b"w:b" => style.bold = toggle_on(element),
        b"w:i" => style.italic = toggle_on(element),
        b"w:u" => style.underline = toggle_on(element),
        b"w:sz" => {
            if let Some(half_points) =
                attribute_value(element, "w:val").and_then(|v| v.parse::<f32>().ok())
            {
                style.font_size = Some(half_points / 2.0);
            }
        }
        b"w:color" => {
            style.color = attribute_value(element, "w:val").filter(|v| v != "auto");
        }
        b"w:rFonts" => {
            style.font_family = attribute_value(element, "w:ascii")
                .or_else(|| attribute_value(element, "w:hAnsi"));
        }
        _ => {}
    }
}

impl XmlPart {
    pub fn parse(name: &str, xml: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(xml);
        let mut events: Vec<Event<'static>> = Vec::new();
        let mut blocks = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut open_text: Option<usize> = None;
        let mut in_run_properties = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| DocumentError::Xml {
                    part: name.to_string(),
                    position: reader.buffer_position(),
                    message: e.to_string(),
                })?
                .into_owned();
            let index = events.len();

            match &event {
                Event::Eof => break,
                Event::Start(e) => match e.name().as_ref() {
                    b"w:tbl" => stack.push(Frame::Table(Table::default())),
                    b"w:tr" => stack.push(Frame::Row(TableRow::default())),
                    b"w:tc" => stack.push(Frame::Cell(TableCell::default())),
                    b"w:p" => stack.push(Frame::Paragraph(Paragraph::default())),
                    b"w:r" => stack.push(Frame::Run(Run::default())),
                    b"w:rPr" => in_run_properties = matches!(stack.last(), Some(Frame::Run(_))),
                    b"w:t" => {
                        if let Some(Frame::Run(run)) = stack.last_mut() {
                            if !run.slots.is_empty() {
                                run.breaks.push(run.text.len());
                            }
                            run.slots.push(TextSlot {
                                start: index,
                                text: None,
                            });
                            open_text = Some(index);
                        }
                    }
                    _ => {
                        if in_run_properties {
                            if let Some(Frame::Run(run)) = stack.last_mut() {
                                apply_style_property(&mut run.style, e);
                            }
                        }
                    }
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:p" => attach_paragraph(&mut stack, &mut blocks, Paragraph::default()),
                    _ => {
                        if in_run_properties {
                            if let Some(Frame::Run(run)) = stack.last_mut() {
                                apply_style_property(&mut run.style, e);
                            }
                        }
                    }
                },
                Event::Text(t) => {
                    if open_text.is_some() {
                        if let Some(Frame::Run(run)) = stack.last_mut() {
                            let value = t.unescape().map_err(|e| DocumentError::Xml {
                                part: name.to_string(),
                                position: reader.buffer_position(),
                                message: e.to_string(),
                            })?;
                            run.text.push_str(&value);
                            if let Some(slot) = run.slots.last_mut() {
                                if slot.text.is_none() {
                                    slot.text = Some(index);
                                }
                            }
                        }
                    }
                }
                Event::End(e) => {
                    let qname = e.name();
                    let tag = qname.as_ref();
                    if is_element(tag, b"w:t") {
                        open_text = None;
                    } else if is_element(tag, b"w:rPr") {
                        in_run_properties = false;
                    } else if is_element(tag, b"w:r") {
                        if let Some(Frame::Run(mut run)) = pop_if(&mut stack, |f| {
                            matches!(f, Frame::Run(_))
                        }) {
                            run.original = run.text.clone();
                            if let Some(Frame::Paragraph(paragraph)) = stack.last_mut() {
                                paragraph.runs.push(run);
                            }
                        }
                    } else if is_element(tag, b"w:p") {
                        if let Some(Frame::Paragraph(paragraph)) =
                            pop_if(&mut stack, |f| matches!(f, Frame::Paragraph(_)))
                        {
                            attach_paragraph(&mut stack, &mut blocks, paragraph);
                        }
                    } else if is_element(tag, b"w:tc") {
                        if let Some(Frame::Cell(cell)) =
                            pop_if(&mut stack, |f| matches!(f, Frame::Cell(_)))
                        {
                            if let Some(Frame::Row(row)) = stack.last_mut() {
                                row.cells.push(cell);
                            }
                        }
                    } else if is_element(tag, b"w:tr") {
                        if let Some(Frame::Row(row)) =
                            pop_if(&mut stack, |f| matches!(f, Frame::Row(_)))
                        {
                            if let Some(Frame::Table(table)) = stack.last_mut() {
                                table.rows.push(row);
                            }
                        }
                    } else if is_element(tag, b"w:tbl") {
                        if let Some(Frame::Table(table)) =
                            pop_if(&mut stack, |f| matches!(f, Frame::Table(_)))
                        {
                            match stack.last_mut() {
                                Some(Frame::Cell(cell)) => cell.tables.push(table),
                                _ => blocks.push(Block::Table(table)),
                            }
                        }
                    }
                }
                _ => {}
            }

            events.push(event);
        }

        Ok(Self {
            name: name.to_string(),
            events,
            blocks,
        })
    }

    /// All substitution targets of this part: every paragraph outside a
    /// table and every table cell, including cells of nested tables.
    pub fn containers_mut(&mut self) -> Vec<TextContainer<'_>> {
        let mut containers = Vec::new();
        for block in &mut self.blocks {
            match block {
                Block::Paragraph(paragraph) => containers.push(TextContainer::Paragraph(paragraph)),
                Block::Table(table) => collect_cells(table, &mut containers),
            }
        }
        containers
    }

    /// Paragraph texts in document order; table rows are flattened to one
    /// line with cells separated by `" | "`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(paragraph) => lines.push(paragraph.text()),
                Block::Table(table) => table_lines(table, &mut lines),
            }
        }
        lines
    }

    /// Serializes the part, writing modified run text back into its `w:t` elements.
    pub fn to_xml(&self) -> Result<Vec<u8>, DocumentError> {
        let mut events = self.events.clone();
        let mut runs = Vec::new();
        for block in &self.blocks {
            collect_block_runs(block, &mut runs);
        }

        for run in runs.into_iter().filter(|run| run.is_modified()) {
            let values = match run.slot_values() {
                Some(values) => values,
                None if run.text.is_empty() => vec![String::new(); run.slots.len()],
                None => {
                    return Err(DocumentError::Unwritable {
                        part: self.name.clone(),
                        message: "run has no text node to hold its value".to_string(),
                    })
                }
            };

            for (slot, value) in run.slots.iter().zip(&values) {
                let Some(text_index) = slot.text else {
                    continue;
                };
                events[slot.start] = preserved_text_start(&events[slot.start]);
                events[text_index] = Event::Text(BytesText::new(value).into_owned());
            }
        }

        let mut writer = Writer::new(Cursor::new(Vec::new()));
        for event in &events {
            writer
                .write_event(event)
                .map_err(|e| DocumentError::Unwritable {
                    part: self.name.clone(),
                    message: e.to_string(),
                })?;
        }
        Ok(writer.into_inner().into_inner())
    }
}

fn pop_if(stack: &mut Vec<Frame>, predicate: impl Fn(&Frame) -> bool) -> Option<Frame> {
    match stack.last() {
        Some(frame) if predicate(frame) => stack.pop(),
        _ => None,
    }
}

fn attach_paragraph(stack: &mut [Frame], blocks: &mut Vec<Block>, paragraph: Paragraph) {
    match stack.last_mut() {
        Some(Frame::Cell(cell)) => cell.paragraphs.push(paragraph),
        // Text box content sits inside a run of an outer paragraph; it is
        // searched as a container of its own.
        _ => blocks.push(Block::Paragraph(paragraph)),
    }
}

fn collect_cells<'a>(table: &'a mut Table, containers: &mut Vec<TextContainer<'a>>) {
    for row in &mut table.rows {
        for cell in &mut row.cells {
            let TableCell { paragraphs, tables } = cell;
            containers.push(TextContainer::TableCell(paragraphs));
            for nested in tables {
                collect_cells(nested, containers);
            }
        }
    }
}

fn table_lines(table: &Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                cell.paragraphs
                    .iter()
                    .map(Paragraph::text)
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        lines.push(cells.join(" | "));
        for cell in &row.cells {
            for nested in &cell.tables {
                table_lines(nested, lines);
            }
        }
    }
}

fn collect_block_runs<'a>(block: &'a Block, runs: &mut Vec<&'a Run>) {
    match block {
        Block::Paragraph(paragraph) => runs.extend(paragraph.runs.iter()),
        Block::Table(table) => collect_table_runs(table, runs),
    }
}

fn collect_table_runs<'a>(table: &'a Table, runs: &mut Vec<&'a Run>) {
    for row in &table.rows {
        for cell in &row.cells {
            for paragraph in &cell.paragraphs {
                runs.extend(paragraph.runs.iter());
            }
            for nested in &cell.tables {
                collect_table_runs(nested, runs);
            }
        }
    }
}

/// Rewritten `w:t` start tag carrying `xml:space="preserve"`, so leading and
/// trailing spaces of substituted values are kept by Word.
fn preserved_text_start(original: &Event<'static>) -> Event<'static> {
    let Event::Start(start) = original else {
        return original.clone();
    };
    let mut rebuilt = BytesStart::new("w:t");
    for attr in start.attributes().flatten() {
        if attr.key.as_ref() != b"xml:space" {
            rebuilt.push_attribute(attr);
        }
    }
    rebuilt.push_attribute(("xml:space", "preserve"));
    Event::Start(rebuilt.into_owned())
}

fn is_editable_part(name: &str) -> bool {
    name == MAIN_PART
        || (name.starts_with("word/header") && name.ends_with(".xml"))
        || (name.starts_with("word/footer") && name.ends_with(".xml"))
}

/// A loaded template package.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    /// Every archive entry in original order; editable parts are taken from
    /// `parts` when saving.
    entries: Vec<(String, Vec<u8>)>,
    parts: Vec<XmlPart>,
}

impl TemplateDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut parts = Vec::new();

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| DocumentError::Archive(e.to_string()))?;

            if is_editable_part(&name) {
                let xml = std::str::from_utf8(&data).map_err(|e| DocumentError::Xml {
                    part: name.clone(),
                    position: e.valid_up_to(),
                    message: "part is not valid UTF-8".to_string(),
                })?;
                parts.push(XmlPart::parse(&name, xml)?);
            }
            entries.push((name, data));
        }

        if !parts.iter().any(|part| part.name == MAIN_PART) {
            return Err(DocumentError::MissingPart(MAIN_PART.to_string()));
        }

        Ok(Self { entries, parts })
    }

    pub fn parts(&self) -> &[XmlPart] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [XmlPart] {
        &mut self.parts
    }

    pub fn main_part(&self) -> Option<&XmlPart> {
        self.parts.iter().find(|part| part.name == MAIN_PART)
    }

    /// Substitution targets across every editable part.
    pub fn containers_mut(&mut self) -> Vec<TextContainer<'_>> {
        self.parts
            .iter_mut()
            .flat_map(|part| part.containers_mut())
            .collect()
    }

    /// Body text, one line per paragraph or table row.
    pub fn body_lines(&self) -> Vec<String> {
        self.main_part().map(XmlPart::lines).unwrap_or_default()
    }

    /// Text of every editable part, headers and footers included.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .flat_map(XmlPart::lines)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, data) in &self.entries {
            if name.ends_with('/') {
                writer.add_directory(name.as_str(), options)?;
                continue;
            }
            writer.start_file(name.as_str(), options)?;
            match self.parts.iter().find(|part| &part.name == name) {
                Some(part) => writer.write_all(&part.to_xml()?),
                None => writer.write_all(data),
            }
            .map_err(|e| DocumentError::Archive(e.to_string()))?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::{docx, paragraph_xml, table_xml};

    #[test]
    fn test_parses_paragraphs_and_runs() {
        let body = paragraph_xml(&[("Dear ", ""), ("Acme", "<w:b/>")]);
        let doc = TemplateDocument::from_bytes(&docx(&body)).unwrap();
        let part = doc.main_part().unwrap();

        assert_eq!(part.blocks.len(), 1);
        let Block::Paragraph(paragraph) = &part.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(paragraph.runs.len(), 2);
        assert_eq!(paragraph.text(), "Dear Acme");
        assert!(!paragraph.runs[0].style.bold);
        assert!(paragraph.runs[1].style.bold);
    }

    #[test]
    fn test_parses_run_style() {
        let body = paragraph_xml(&[(
            "styled",
            r#"<w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:i/><w:u w:val="single"/><w:b w:val="0"/><w:color w:val="FF0000"/><w:sz w:val="28"/>"#,
        )]);
        let doc = TemplateDocument::from_bytes(&docx(&body)).unwrap();
        let Block::Paragraph(paragraph) = &doc.main_part().unwrap().blocks[0] else {
            panic!("expected paragraph");
        };
        let style = &paragraph.runs[0].style;

        assert!(!style.bold);
        assert!(style.italic);
        assert!(style.underline);
        assert_eq!(style.font_family.as_deref(), Some("Arial"));
        assert_eq!(style.color.as_deref(), Some("FF0000"));
        assert_eq!(style.font_size, Some(14.0));
    }

    #[test]
    fn test_parses_tables_with_multi_paragraph_cells() {
        let body = table_xml(&[vec![
            vec!["Rate", "per sq ft"],
            vec!["<rate1>"],
        ]]);
        let mut doc = TemplateDocument::from_bytes(&docx(&body)).unwrap();
        assert_eq!(doc.body_lines(), vec!["Rate per sq ft | <rate1>".to_string()]);

        let containers = doc.containers_mut();
        assert_eq!(containers.len(), 2);
        assert!(containers.iter().all(TextContainer::is_table_cell));
    }

    #[test]
    fn test_empty_paragraph_has_no_runs() {
        let doc = TemplateDocument::from_bytes(&docx("<w:p/><w:p></w:p>")).unwrap();
        let part = doc.main_part().unwrap();
        assert_eq!(part.blocks.len(), 2);
        assert_eq!(part.lines(), vec![String::new(), String::new()]);
    }

    #[test]
    fn test_unmodified_round_trip_keeps_text_and_formatting() {
        let body = paragraph_xml(&[("Tom & Co", "<w:b/>"), (" Ltd", "")]);
        let original = docx(&body);
        let doc = TemplateDocument::from_bytes(&original).unwrap();
        let reloaded = TemplateDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();

        assert_eq!(reloaded.text(), "Tom & Co Ltd");
        let Block::Paragraph(paragraph) = &reloaded.main_part().unwrap().blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(paragraph.runs[0].style.bold);
    }

    #[test]
    fn test_modified_run_written_back_with_preserved_space() {
        let body = paragraph_xml(&[("<partyname>", "<w:b/>")]);
        let mut doc = TemplateDocument::from_bytes(&docx(&body)).unwrap();
        for mut container in doc.containers_mut() {
            for run in container.runs_mut() {
                run.text = " A < B ".to_string();
            }
        }

        let bytes = doc.to_bytes().unwrap();
        let reloaded = TemplateDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.text(), " A < B ");

        let xml = String::from_utf8(reloaded.main_part().unwrap().to_xml().unwrap()).unwrap();
        assert!(xml.contains(r#"xml:space="preserve""#));
        assert!(xml.contains("A &lt; B"));
        assert!(xml.contains("<w:b/>"));
    }

    #[test]
    fn test_text_stays_on_its_side_of_a_tab() {
        use crate::document::substitute::replace_placeholders;

        let body = concat!(
            r#"<w:p><w:r><w:t>&lt;date&gt;</w:t><w:tab/><w:t>&lt;year&gt;</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>Date: &lt;da</w:t><w:br/><w:t>te&gt; ok</w:t></w:r></w:p>"#,
        );
        let mut doc = TemplateDocument::from_bytes(&docx(body)).unwrap();
        let placeholders = vec![
            ("<date>".to_string(), "14 March".to_string()),
            ("<year>".to_string(), "2025".to_string()),
        ];
        replace_placeholders(&mut doc, &placeholders);

        let xml = String::from_utf8(doc.main_part().unwrap().to_xml().unwrap()).unwrap();
        let date = xml.find("14 March</w:t>").unwrap();
        let tab = xml.find("<w:tab/>").unwrap();
        let year = xml.find(">2025</w:t>").unwrap();
        assert!(date < tab && tab < year);

        // a token split by the break lands before it, the rest stays after
        let split = xml.find("Date: 14 March</w:t>").unwrap();
        let br = xml.find("<w:br/>").unwrap();
        let rest = xml.find("> ok</w:t>").unwrap();
        assert!(split < br && br < rest);
    }

    #[test]
    fn test_replace_range_moves_slot_boundaries() {
        let body = r#"<w:p><w:r><w:t>ab</w:t><w:tab/><w:t>cd</w:t><w:tab/><w:t>ef</w:t></w:r></w:p>"#;
        let mut doc = TemplateDocument::from_bytes(&docx(body)).unwrap();
        for mut container in doc.containers_mut() {
            for run in container.runs_mut() {
                // "abcdef" -> "aXYZf": the middle slot is swallowed
                run.replace_range(1, 5, "XYZ");
            }
        }

        let xml = String::from_utf8(doc.main_part().unwrap().to_xml().unwrap()).unwrap();
        assert!(xml.contains(r#">aXYZ</w:t><w:tab/><w:t xml:space="preserve"></w:t><w:tab/><w:t xml:space="preserve">f</w:t>"#));
    }

    #[test]
    fn test_header_parts_are_editable() {
        let header = format!(
            r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:hdr>"#,
            paragraph_xml(&[("Estimate <year>", "")])
        );
        let bytes = crate::document::test_support::docx_with_parts(
            &paragraph_xml(&[("body", "")]),
            &[("word/header1.xml", header.as_str())],
        );
        let mut doc = TemplateDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.parts().len(), 2);
        assert_eq!(doc.containers_mut().len(), 2);
        assert!(doc.text().contains("Estimate <year>"));
    }

    #[test]
    fn test_rejects_non_zip_input() {
        let result = TemplateDocument::from_bytes(b"not a docx");
        assert!(matches!(result, Err(DocumentError::Archive(_))));
    }

    #[test]
    fn test_rejects_package_without_body() {
        let bytes = crate::document::test_support::zip_entries(&[("[Content_Types].xml", "<Types/>")]);
        let result = TemplateDocument::from_bytes(&bytes);
        assert!(matches!(result, Err(DocumentError::MissingPart(_))));
    }

    #[test]
    fn test_rejects_malformed_xml() {
        let bytes_mismatched =
            crate::document::test_support::zip_entries(&[(MAIN_PART, "<w:p></w:r>")]);
        assert!(matches!(
            TemplateDocument::from_bytes(&bytes_mismatched),
            Err(DocumentError::Xml { .. })
        ));
    }
}
