//! Turns uploaded files and fetched web pages into documents.
//!
//! Dispatch is by extension. Plain text and unknown formats are decoded as
//! lossy UTF-8; Markdown is split into one document per heading section.
//! PDF text comes from `pdf-extract`, DOCX text from the package's
//! `word/document.xml`.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use zip::read::ZipArchive;

use copilot_types::{
    CopilotError, Result,
    document::{Document, DocumentFormat},
};

/// A file as received from the upload surface
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

pub fn parse_upload(filename: &str, bytes: &[u8]) -> Result<Vec<Document>> {
    match DocumentFormat::from_filename(filename) {
        DocumentFormat::Pdf => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| unreadable(filename, e))?;
            binary_document(filename, text)
        }
        DocumentFormat::Docx => {
            let text = docx_text(bytes).map_err(|e| unreadable(filename, e))?;
            binary_document(filename, text)
        }
        DocumentFormat::Markdown => {
            let text = String::from_utf8_lossy(bytes);
            Ok(split_markdown(&text)
                .into_iter()
                .map(|section| Document::new(section).with_meta("filename", filename))
                .collect())
        }
        DocumentFormat::Text | DocumentFormat::Other => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            Ok(vec![Document::new(text).with_meta("filename", filename)])
        }
    }
}

fn unreadable(filename: &str, e: impl std::fmt::Display) -> CopilotError {
    CopilotError::Ingest(format!("{}: {}", filename, e))
}

/// Extracted text of a PDF or DOCX; a file without any is reported.
fn binary_document(filename: &str, text: String) -> Result<Vec<Document>> {
    if text.trim().is_empty() {
        return Err(unreadable(filename, "no readable text"));
    }
    Ok(vec![Document::new(text.trim()).with_meta("filename", filename)])
}

/// Paragraph text of a DOCX package, one line per `w:p`.
fn docx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    let mut reader = XmlReader::from_str(&xml);
    let mut buf = Vec::new();
    let mut text = String::new();
    // Only `w:t` runs carry document text; everything else is markup
    let mut in_run = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_run => {
                text.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Parse a batch of uploads. Files that fail are reported individually and
/// do not prevent the rest from loading.
pub fn parse_uploads(files: &[UploadedFile]) -> (Vec<Document>, Vec<CopilotError>) {
    let mut docs = Vec::new();
    let mut errors = Vec::new();
    for file in files {
        match parse_upload(&file.name, &file.bytes) {
            Ok(parsed) => docs.extend(parsed),
            Err(e) => {
                log::warn!("skipping upload {}: {}", file.name, e);
                errors.push(e);
            }
        }
    }
    (docs, errors)
}

/// One section per ATX heading; text before the first heading is its own
/// section. Empty sections are dropped.
fn split_markdown(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && line.starts_with('#') && !current.trim().is_empty() {
            sections.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current.trim().to_string());
    }
    sections
}

// ─── Web pages ───────────────────────────────────────────────

/// One URL per line; blank lines are ignored.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Only absolute http(s) URLs are fetched.
pub fn check_url(url: &str) -> Result<()> {
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(CopilotError::Ingest(format!("{}: not an http(s) URL", url))),
    }
}

/// A fetched page as a document tagged with its URL.
pub fn web_document(url: &str, html: &str) -> Result<Document> {
    let text = html_to_text(html);
    if text.is_empty() {
        return Err(CopilotError::Ingest(format!("{}: page has no text", url)));
    }
    Ok(Document::new(text).with_meta("url", url))
}

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "noscript", "template", "svg"];

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "table", "section", "article", "header",
    "footer", "nav", "aside", "main", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote",
    "hr", "dt", "dd", "title", "body",
];

/// Visible text of an HTML page. Tags are dropped, the contents of
/// scripts, styles and the head are skipped, block elements start a new
/// line, and whitespace inside a line is collapsed.
pub fn html_to_text(html: &str) -> String {
    let mut raw = String::new();
    let mut rest = html;
    let mut skipping: Option<String> = None;

    while let Some(open) = rest.find('<') {
        if skipping.is_none() {
            push_text(&mut raw, &rest[..open]);
        }
        let after = &rest[open + 1..];
        if let Some(comment) = after.strip_prefix("!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }
        let Some(close) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = &after[..close];
        rest = &after[close + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if let Some(skipped) = &skipping {
            if closing && name == *skipped {
                skipping = None;
            }
            continue;
        }
        if !closing && !tag.ends_with('/') && SKIPPED_ELEMENTS.contains(&name.as_str()) {
            skipping = Some(name);
        } else if BLOCK_ELEMENTS.contains(&name.as_str()) {
            raw.push('\n');
        }
    }
    if skipping.is_none() {
        push_text(&mut raw, rest);
    }

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_text(out: &mut String, text: &str) {
    out.push_str(&decode_entities(&text.replace(['\n', '\r'], " ")));
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| entity(&after[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}
