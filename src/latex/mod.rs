//! LaTeX output: template, Markdown translation, boilerplate extraction.
//!
//! ```text
//! page text ──▶ extract_boilerplate ──┬─ LaTeX body ──────────────┐
//!                                     └─ Markdown ─▶ markdown_to_latex ─┤
//!                                                                 join ─▶ LatexTemplate::render
//! ```

pub mod boilerplate;
pub mod markdown;
pub mod template;

pub use boilerplate::{extract_boilerplate, looks_like_latex, Extraction};
pub use markdown::markdown_to_latex;
pub use template::{LatexTemplate, Package};

use crate::config::{LatexOptions, OutputFormat, PageSeparator};
use crate::output::PageResult;
use tracing::debug;

/// Title used when neither the caller, the model nor the PDF supplies one.
pub const DEFAULT_TITLE: &str = "Transcribed Notes";

/// `\date{}` contents when the caller does not choose one.
pub const DEFAULT_DATE: &str = "\\today";

/// Escape LaTeX special characters in plain text.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the complete LaTeX document from transcribed pages.
///
/// Each successful page is stripped of document scaffolding and, unless it is
/// already LaTeX, translated from Markdown. The title is the first of:
/// `options.title`, a `\title` found in model output, `fallback_title`
/// (usually the PDF metadata title), [`DEFAULT_TITLE`]. A `\date` found in
/// model output replaces `options.date` only while it is [`DEFAULT_DATE`].
pub fn render_document(
    pages: &[PageResult],
    options: &LatexOptions,
    separator: &PageSeparator,
    fallback_title: Option<&str>,
) -> String {
    let mut body = String::new();
    let mut model_title: Option<String> = None;
    let mut model_author: Option<String> = None;
    let mut model_date: Option<String> = None;
    let mut packages: Vec<Package> = Vec::new();

    for page in pages.iter().filter(|p| p.is_ok()) {
        let extraction = extract_boilerplate(&page.text);
        if extraction.is_latex {
            debug!("Page {}: model answered in LaTeX, passing through", page.page_num);
        }
        model_title = model_title.or(extraction.title);
        model_author = model_author.or(extraction.author);
        model_date = model_date.or(extraction.date);
        packages.extend(extraction.packages);

        let tex = if extraction.is_latex {
            extraction.body
        } else {
            markdown_to_latex(&extraction.body)
        };
        let tex = tex.trim();
        if tex.is_empty() {
            continue;
        }
        if !body.is_empty() {
            body.push_str(&separator.render(page.page_num, OutputFormat::Latex));
        }
        body.push_str(tex);
    }

    let title = options
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .or(model_title)
        .or_else(|| {
            fallback_title
                .filter(|t| !t.trim().is_empty())
                .map(escape_latex)
        })
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let author = if options.author.trim().is_empty() {
        model_author.unwrap_or_default()
    } else {
        options.author.clone()
    };

    let date = match model_date {
        Some(date) if options.date == DEFAULT_DATE => date,
        _ => options.date.clone(),
    };

    let mut template = LatexTemplate::new(title, author, date);
    for package in packages {
        template.add_package(package);
    }
    template.render(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;

    fn page(n: usize, text: &str) -> PageResult {
        PageResult {
            text: text.to_string(),
            error: None,
            ..PageResult::failed(n, PageError::Timeout { page: n, secs: 1 })
        }
    }

    #[test]
    fn escapes_specials() {
        assert_eq!(escape_latex("a_b & 100% {x} #1 $"), "a\\_b \\& 100\\% \\{x\\} \\#1 \\$");
        assert_eq!(escape_latex("~^\\"), "\\textasciitilde{}\\textasciicircum{}\\textbackslash{}");
        assert_eq!(escape_latex("àèìòù"), "àèìòù");
    }

    #[test]
    fn default_title_and_single_document() {
        let doc = render_document(
            &[page(1, "# Uno\n"), page(2, "Due\n")],
            &LatexOptions::default(),
            &PageSeparator::None,
            None,
        );
        assert!(doc.contains("\\title{Transcribed Notes}"));
        assert!(doc.contains("\\section{Uno}\n\nDue"));
        assert_eq!(doc.matches("\\documentclass").count(), 1);
        assert!(doc.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn model_document_is_unwrapped() {
        let latex_page = "\\documentclass{article}\n\\usepackage{tikz}\n\\title{Chimica}\n\\begin{document}\n\\maketitle\n\\section{Atomi}\n\\end{document}";
        let doc = render_document(
            &[page(1, latex_page), page(2, "## Legami")],
            &LatexOptions::default(),
            &PageSeparator::Comment,
            Some("scan_0001"),
        );
        assert_eq!(doc.matches("\\documentclass").count(), 1);
        assert_eq!(doc.matches("\\begin{document}").count(), 1);
        assert_eq!(doc.matches("\\maketitle").count(), 1);
        assert!(doc.contains("\\title{Chimica}"));
        assert!(doc.contains("\\usepackage{tikz}"));
        assert!(doc.contains("\\section{Atomi}\n\n% page 2\n\n\\subsection{Legami}"));
    }

    #[test]
    fn title_precedence() {
        let options = LatexOptions {
            title: Some("Scelto".into()),
            ..LatexOptions::default()
        };
        let pages = [page(1, "\\title{Dal modello}\n\\section{A}")];
        let doc = render_document(&pages, &options, &PageSeparator::None, Some("meta"));
        assert!(doc.contains("\\title{Scelto}"));

        let doc = render_document(&pages, &LatexOptions::default(), &PageSeparator::None, Some("meta"));
        assert!(doc.contains("\\title{Dal modello}"));

        let doc = render_document(&[page(1, "x")], &LatexOptions::default(), &PageSeparator::None, Some("note_1"));
        assert!(doc.contains("\\title{note\\_1}"));
    }

    #[test]
    fn model_date_replaces_only_the_default() {
        let pages = [page(1, "\\date{12 marzo 2024}\n\\section{Ottica}")];
        let doc = render_document(&pages, &LatexOptions::default(), &PageSeparator::None, None);
        assert!(doc.contains("\\date{12 marzo 2024}"));
        assert!(!doc.contains("\\date{\\today}"));

        let options = LatexOptions {
            date: "Primavera 2024".into(),
            ..LatexOptions::default()
        };
        let doc = render_document(&pages, &options, &PageSeparator::None, None);
        assert!(doc.contains("\\date{Primavera 2024}"));
        assert!(!doc.contains("12 marzo"));

        let doc = render_document(&[page(1, "testo")], &LatexOptions::default(), &PageSeparator::None, None);
        assert!(doc.contains("\\date{\\today}"));
    }

    #[test]
    fn failed_pages_are_skipped() {
        let pages = [
            page(1, "uno"),
            PageResult::failed(2, PageError::Timeout { page: 2, secs: 60 }),
        ];
        let doc = render_document(&pages, &LatexOptions::default(), &PageSeparator::None, None);
        assert!(doc.contains("uno"));
        assert!(!doc.contains("timed out"));
    }
}
