#[cfg(test)]
mod tests;

use scraper::{Html, node::Node};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{Result, SiteQaError};

/// File extensions recognized as HTML pages.
const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

/// Elements that carry no article content and are removed before text
/// extraction.
const STRIP_TAGS: &[&str] = &["script", "style", "nav", "footer", "noscript", "template"];

/// Elements that introduce a line break around their text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// One HTML file with non-empty extracted text.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
}

impl SourceDocument {
    /// Identifier used for citations: the file name, matching how the site
    /// mirror refers to its own pages.
    #[inline]
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A file that could not be read or decoded. Recoverable: the walk
/// continues with the remaining files.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Result of walking a content directory: documents plus per-file warnings,
/// so callers can distinguish "continue" from "abort" without exception
/// matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedSite {
    pub documents: Vec<SourceDocument>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Walk `content_dir` and extract cleaned text from every HTML file.
///
/// A missing directory is fatal; an unreadable or undecodable file is a
/// recorded warning and the walk continues. Files whose text is empty after
/// stripping are skipped silently.
#[inline]
pub fn extract_site<P: AsRef<Path>>(content_dir: P) -> Result<ExtractedSite> {
    let content_dir = content_dir.as_ref();
    if !content_dir.is_dir() {
        return Err(SiteQaError::ContentNotFound(format!(
            "content directory not found: {}",
            content_dir.display()
        )));
    }

    let mut site = ExtractedSite::default();

    for entry in WalkDir::new(content_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                None
            }
        })
    {
        if !entry.file_type().is_file() || !has_html_extension(entry.path()) {
            continue;
        }

        match read_html_file(entry.path()) {
            Ok(html) => {
                let text = extract_text(&html);
                if text.is_empty() {
                    debug!("No content in {}, skipping", entry.path().display());
                } else {
                    site.documents.push(SourceDocument {
                        path: entry.path().to_path_buf(),
                        text,
                    });
                }
            }
            Err(message) => {
                warn!("Could not process {}: {}", entry.path().display(), message);
                site.warnings.push(ExtractionWarning {
                    path: entry.path().to_path_buf(),
                    message,
                });
            }
        }
    }

    debug!(
        "Extracted {} documents ({} warnings) from {}",
        site.documents.len(),
        site.warnings.len(),
        content_dir.display()
    );

    Ok(site)
}

fn has_html_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            HTML_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn read_html_file(path: &Path) -> std::result::Result<String, String> {
    let bytes = fs::read(path).map_err(|e| format!("read failed: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {e}"))
}

/// Extract visible text from an HTML document, one logical line per
/// block-level element, with navigation/footer/script/style removed.
#[inline]
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    collect_text(document.tree.root(), &mut raw);

    // Collapse to non-empty trimmed lines, mirroring
    // get_text(separator="\n", strip=True) in the original mirror tooling.
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(element) => {
                let name = element.name();
                if STRIP_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}
