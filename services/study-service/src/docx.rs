//! DOCX text extraction

use docx_rs::{
    DocumentChild, InsertChild, Paragraph, ParagraphChild, RunChild, StructuredDataTag,
    StructuredDataTagChild, Table, TableCell, TableCellContent, TableChild, TableRowChild,
};
use studyforge_utils::{StudyError, StudyResult};

/// Plain text of a DOCX document, trimmed.
///
/// Each non-empty paragraph is a line. Table rows become lines of
/// tab-separated cells. Hyperlinks, tracked insertions and content controls
/// contribute their runs; tracked deletions do not.
pub fn extract_docx_text(data: &[u8]) -> StudyResult<String> {
    let docx = docx_rs::read_docx(data)
        .map_err(|e| StudyError::document_processing(format!("Failed to read DOCX: {}", e)))?;

    let mut lines: Vec<String> = Vec::new();

    for child in docx.document.children.iter() {
        match child {
            DocumentChild::Paragraph(paragraph) => push_line(&mut lines, paragraph_text(paragraph)),
            DocumentChild::Table(table) => lines.extend(table_lines(table)),
            DocumentChild::StructuredDataTag(tag) => lines.extend(tag_lines(tag)),
            _ => {}
        }
    }

    Ok(lines.join("\n").trim().to_string())
}

fn push_line(lines: &mut Vec<String>, text: String) {
    if !text.trim().is_empty() {
        lines.push(text);
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    inline_text(&paragraph.children)
}

fn inline_text(children: &[ParagraphChild]) -> String {
    children
        .iter()
        .map(|child| match child {
            ParagraphChild::Run(run) => run_text(&run.children),
            ParagraphChild::Hyperlink(link) => inline_text(&link.children),
            ParagraphChild::Insert(insert) => insert
                .children
                .iter()
                .map(|ic| match ic {
                    InsertChild::Run(run) => run_text(&run.children),
                    _ => String::new(),
                })
                .collect(),
            ParagraphChild::StructuredDataTag(tag) => tag_lines(tag).join(" "),
            _ => String::new(),
        })
        .collect()
}

fn table_lines(table: &Table) -> Vec<String> {
    let mut lines = Vec::new();
    for TableChild::TableRow(row) in &table.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|TableRowChild::TableCell(cell)| cell_text(cell))
            .collect();
        push_line(&mut lines, cells.join("\t").trim_end().to_string());
    }
    lines
}

/// Everything in a cell on one line; nested tables included.
fn cell_text(cell: &TableCell) -> String {
    let mut parts = Vec::new();
    for content in &cell.children {
        match content {
            TableCellContent::Paragraph(paragraph) => push_line(&mut parts, paragraph_text(paragraph)),
            TableCellContent::Table(table) => parts.extend(table_lines(table)),
            TableCellContent::StructuredDataTag(tag) => parts.extend(tag_lines(tag)),
            _ => {}
        }
    }
    parts.join(" ").replace(['\t', '\n'], " ")
}

fn tag_lines(tag: &StructuredDataTag) -> Vec<String> {
    let mut lines = Vec::new();
    for child in &tag.children {
        match child {
            StructuredDataTagChild::Run(run) => push_line(&mut lines, run_text(&run.children)),
            StructuredDataTagChild::Paragraph(paragraph) => push_line(&mut lines, paragraph_text(paragraph)),
            StructuredDataTagChild::Table(table) => lines.extend(table_lines(table)),
            StructuredDataTagChild::StructuredDataTag(nested) => lines.extend(tag_lines(nested)),
            _ => {}
        }
    }
    lines
}

fn run_text(children: &[RunChild]) -> String {
    children
        .iter()
        .filter_map(|rc| match rc {
            RunChild::Text(t) => Some(t.text.as_str()),
            RunChild::Tab(_) => Some("\t"),
            _ => None,
        })
        .collect()
}
