//! Text extraction from supported document formats.
//!
//! Each format yields plain text plus the side lists the query side cares
//! about: image references, tables, and equations.
use std::path::Path;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::utils::files::dotted_extension;
use crate::utils::validation::ParseMethod;

pub mod chunking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Markdown,
    Text,
    Pdf,
    Docx,
    Pptx,
    Other,
}

impl DocumentKind {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match dotted_extension(path).as_str() {
            ".md" | ".markdown" => Self::Markdown,
            ".txt" => Self::Text,
            ".pdf" => Self::Pdf,
            ".docx" => Self::Docx,
            ".pptx" => Self::Pptx,
            _ => Self::Other,
        }
    }
}

/// Which side lists to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub parse_method: ParseMethod,
    pub images: bool,
    pub tables: bool,
    pub equations: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            parse_method: ParseMethod::Auto,
            images: true,
            tables: true,
            equations: true,
        }
    }
}

/// A disabled side list is `None` and serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub images: Option<Vec<String>>,
    pub tables: Option<Vec<String>>,
    pub equations: Option<Vec<String>>,
}

impl ExtractedDocument {
    fn new(text: String, options: &ExtractOptions) -> Self {
        Self {
            text,
            images: options.images.then(Vec::new),
            tables: options.tables.then(Vec::new),
            equations: options.equations.then(Vec::new),
        }
    }
}

/// Extract text from `path` according to its extension.
///
/// Blocking; call through `spawn_blocking` from async code.
pub fn extract(path: &Path, options: &ExtractOptions) -> Result<ExtractedDocument> {
    if options.parse_method == ParseMethod::Ocr {
        warn!(
            "OCR parsing is not available, using text extraction for {}",
            path.display()
        );
    }

    let kind = DocumentKind::from_path(path);
    debug!("Extracting {} as {:?}", path.display(), kind);

    match kind {
        DocumentKind::Markdown if options.parse_method == ParseMethod::Txt => {
            Ok(ExtractedDocument::new(read_lossy(path)?, options))
        }
        DocumentKind::Markdown => Ok(extract_markdown(&read_lossy(path)?, options)),
        DocumentKind::Text => Ok(ExtractedDocument::new(read_lossy(path)?, options)),
        DocumentKind::Pdf => extract_pdf(path, options),
        DocumentKind::Docx => extract_docx(path, options),
        DocumentKind::Pptx | DocumentKind::Other => Err(RagError::Unsupported(format!(
            "no extractor for {}",
            path.display()
        ))),
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ── Markdown ─────────────────────────────────────────────────────────

/// Flatten markdown to text, keeping paragraph breaks so the chunker can
/// split on them.
pub fn extract_markdown(content: &str, options: &ExtractOptions) -> ExtractedDocument {
    let mut doc = ExtractedDocument::new(String::new(), options);
    let mut text = String::new();

    let mut table: Option<Vec<String>> = None;
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_cell = false;

    let parser = Parser::new_ext(content, Options::ENABLE_TABLES | Options::ENABLE_MATH);
    for event in parser {
        match event {
            Event::Text(t) | Event::Code(t) => {
                text.push_str(&t);
                if in_cell {
                    cell.push_str(&t);
                }
            }
            Event::InlineMath(m) | Event::DisplayMath(m) => {
                text.push_str(&m);
                if let Some(eqs) = doc.equations.as_mut() {
                    eqs.push(m.trim().to_string());
                }
            }
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::Start(Tag::Image { dest_url, .. }) => {
                if let Some(images) = doc.images.as_mut() {
                    images.push(dest_url.to_string());
                }
            }
            Event::Start(Tag::Table(_)) => table = Some(Vec::new()),
            Event::Start(Tag::TableCell) => {
                in_cell = true;
                cell.clear();
            }
            Event::End(TagEnd::TableCell) => {
                in_cell = false;
                row.push(cell.trim().to_string());
                text.push_str(" | ");
            }
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                if let Some(rows) = table.as_mut() {
                    rows.push(std::mem::take(&mut row).join(" | "));
                }
                text.push('\n');
            }
            Event::End(TagEnd::Table) => {
                if let (Some(rows), Some(tables)) = (table.take(), doc.tables.as_mut()) {
                    tables.push(rows.join("\n"));
                }
                text.push_str("\n\n");
            }
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_)
                | TagEnd::List(_),
            ) => text.push_str("\n\n"),
            Event::End(TagEnd::Item) => text.push('\n'),
            _ => {}
        }
    }

    doc.text = text.trim().to_string();
    doc
}

// ── PDF ──────────────────────────────────────────────────────────────

fn extract_pdf(path: &Path, options: &ExtractOptions) -> Result<ExtractedDocument> {
    let pdf = lopdf::Document::load(path)
        .map_err(|e| RagError::Extraction(format!("{}: {e}", path.display())))?;
    let pages: Vec<u32> = pdf.get_pages().keys().copied().collect();

    let mut text = String::new();
    for page in pages {
        match pdf.extract_text(&[page]) {
            Ok(page_text) => {
                text.push_str(page_text.trim());
                text.push_str("\n\n");
            }
            Err(e) => warn!("Failed to extract page {page} of {}: {e}", path.display()),
        }
    }

    Ok(ExtractedDocument::new(text.trim().to_string(), options))
}

// ── DOCX ─────────────────────────────────────────────────────────────

fn extract_docx(path: &Path, options: &ExtractOptions) -> Result<ExtractedDocument> {
    use docx_rs::DocumentChild;

    let bytes = std::fs::read(path)?;
    let docx = docx_rs::read_docx(&bytes)
        .map_err(|e| RagError::Extraction(format!("{}: {e}", path.display())))?;

    let mut doc = ExtractedDocument::new(String::new(), options);
    let mut text = String::new();
    let mut image_count = 0usize;

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                let line = paragraph_text(p, &mut image_count);
                if !line.trim().is_empty() {
                    text.push_str(line.trim());
                    text.push_str("\n\n");
                }
            }
            DocumentChild::Table(t) => {
                let rendered = table_text(t, &mut image_count);
                if !rendered.is_empty() {
                    text.push_str(&rendered);
                    text.push_str("\n\n");
                    if let Some(tables) = doc.tables.as_mut() {
                        tables.push(rendered);
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(images) = doc.images.as_mut() {
        images.extend((1..=image_count).map(|n| format!("embedded image {n}")));
    }
    doc.text = text.trim().to_string();
    Ok(doc)
}

fn paragraph_text(p: &docx_rs::Paragraph, image_count: &mut usize) -> String {
    use docx_rs::{ParagraphChild, RunChild};

    let mut out = String::new();
    for child in &p.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                match rc {
                    RunChild::Text(t) => out.push_str(&t.text),
                    RunChild::Tab(_) => out.push('\t'),
                    RunChild::Break(_) => out.push('\n'),
                    RunChild::Drawing(_) => *image_count += 1,
                    _ => {}
                }
            }
        }
    }
    out
}

#[allow(irrefutable_let_patterns)]
fn table_text(t: &docx_rs::Table, image_count: &mut usize) -> String {
    use docx_rs::{TableCellContent, TableChild, TableRowChild};

    let mut rows = Vec::new();
    for row in &t.rows {
        let TableChild::TableRow(row) = row else {
            continue;
        };
        let mut cells = Vec::new();
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell else {
                continue;
            };
            let mut cell_text = String::new();
            for content in &cell.children {
                if let TableCellContent::Paragraph(p) = content {
                    if !cell_text.is_empty() {
                        cell_text.push(' ');
                    }
                    cell_text.push_str(paragraph_text(p, image_count).trim());
                }
            }
            cells.push(cell_text);
        }
        rows.push(cells.join(" | "));
    }
    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_document_kind() {
        assert_eq!(DocumentKind::from_path(Path::new("a/README.MD")), DocumentKind::Markdown);
        assert_eq!(DocumentKind::from_path(Path::new("notes.txt")), DocumentKind::Text);
        assert_eq!(DocumentKind::from_path(Path::new("paper.pdf")), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("deck.pptx")), DocumentKind::Pptx);
        assert_eq!(DocumentKind::from_path(Path::new("Makefile")), DocumentKind::Other);
    }

    #[test]
    fn test_markdown_text_and_images() {
        let md = "# Title\n\nSome *text* here.\n\n![diagram](img/arch.png)\n";
        let doc = extract_markdown(md, &ExtractOptions::default());
        assert!(doc.text.starts_with("Title"));
        assert!(doc.text.contains("Some text here."));
        assert_eq!(doc.images, Some(vec!["img/arch.png".to_string()]));
    }

    #[test]
    fn test_markdown_tables() {
        let md = "| Name | Score |\n|------|-------|\n| Ada | 10 |\n| Bob | 7 |\n";
        let doc = extract_markdown(md, &ExtractOptions::default());
        let tables = doc.tables.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0], "Name | Score\nAda | 10\nBob | 7");
        assert!(doc.text.contains("Ada"));
    }

    #[test]
    fn test_markdown_equations() {
        let md = "Energy is $E = mc^2$ in short.\n\n$$\\int_0^1 x\\,dx$$\n";
        let doc = extract_markdown(md, &ExtractOptions::default());
        let eqs = doc.equations.unwrap();
        assert_eq!(eqs.len(), 2);
        assert_eq!(eqs[0], "E = mc^2");
    }

    #[test]
    fn test_disabled_lists_are_none() {
        let opts = ExtractOptions {
            images: false,
            tables: false,
            equations: false,
            ..ExtractOptions::default()
        };
        let doc = extract_markdown("![x](y.png) $a$", &opts);
        assert!(doc.images.is_none());
        assert!(doc.tables.is_none());
        assert!(doc.equations.is_none());
    }

    #[test]
    fn test_extract_text_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "plain notes").unwrap();
        let doc = extract(&path, &ExtractOptions::default()).unwrap();
        assert_eq!(doc.text, "plain notes");
        assert_eq!(doc.images, Some(vec![]));
    }

    #[test]
    fn test_markdown_as_txt_keeps_raw_source() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("doc.md");
        fs::write(&path, "# Heading").unwrap();
        let opts = ExtractOptions {
            parse_method: ParseMethod::Txt,
            ..ExtractOptions::default()
        };
        assert_eq!(extract(&path, &opts).unwrap().text, "# Heading");
    }

    #[test]
    fn test_pptx_is_unsupported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("deck.pptx");
        fs::write(&path, "not really a deck").unwrap();
        let err = extract(&path, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, RagError::Unsupported(_)));
    }

    #[test]
    fn test_corrupt_pdf_is_extraction_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, "not a pdf").unwrap();
        let err = extract(&path, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }
}
