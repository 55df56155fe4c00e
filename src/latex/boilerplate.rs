//! Extraction of LaTeX document scaffolding from model output.
//!
//! Asked for Markdown, a model will still now and then answer with a whole
//! LaTeX document: `\documentclass`, a preamble, `\begin{document}`,
//! `\maketitle`. Pasting that inside the template would nest two documents.
//! [`extract_boilerplate`] keeps the body and lifts out what the template can
//! reuse (title, author, date, packages).

use super::template::Package;
use once_cell::sync::Lazy;
use regex::Regex;

/// One page of model output split into body and scaffolding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Text between `\begin{document}` and `\end{document}` (or everything,
    /// when there is no document environment), with title commands removed.
    pub body: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub packages: Vec<Package>,
    /// The text is LaTeX and must not go through the Markdown translator.
    pub is_latex: bool,
}

static RE_DOCUMENTCLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t]*\\documentclass(?:\[[^\]]*\])?\{[^}]*\}[ \t]*\n?").expect("valid regex")
});
static RE_BEGIN_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\begin\{document\}[ \t]*\n?").expect("valid regex"));
static RE_END_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\end\{document\}").expect("valid regex"));
static RE_USEPACKAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t]*\\usepackage(?:\[([^\]]*)\])?\{([^}]*)\}[ \t]*\n?").expect("valid regex")
});
static RE_MAKETITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*\\maketitle[ \t]*\n?").expect("valid regex"));

/// `\name{...}` allowing one level of nested braces, e.g. `\title{Note \emph{I}}`.
fn command_regex(name: &str) -> Regex {
    Regex::new(&format!(
        r"[ \t]*\\{name}\{{((?:[^{{}}]|\{{[^{{}}]*\}})*)\}}[ \t]*\n?"
    ))
    .expect("valid regex")
}

static RE_TITLE: Lazy<Regex> = Lazy::new(|| command_regex("title"));
static RE_AUTHOR: Lazy<Regex> = Lazy::new(|| command_regex("author"));
static RE_DATE: Lazy<Regex> = Lazy::new(|| command_regex("date"));

static RE_STRUCTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(?:part|chapter|section|subsection|subsubsection|paragraph|subparagraph)\*?\{|\\begin\{(?:itemize|enumerate|description|document|abstract|theorem|definition)\}|\\documentclass",
    )
    .expect("valid regex")
});
static RE_MARKDOWN_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6} ").expect("valid regex"));

/// Whether `text` is a raw LaTeX body rather than Markdown.
///
/// Display maths (`\begin{aligned}` and friends) appears in Markdown too, so
/// only sectioning commands and text environments count, and any Markdown
/// heading vetoes.
pub fn looks_like_latex(text: &str) -> bool {
    RE_STRUCTURE.is_match(text) && !RE_MARKDOWN_HEADING.is_match(text)
}

fn capture(re: &Regex, texts: &[&str]) -> Option<String> {
    texts
        .iter()
        .find_map(|t| re.captures(t))
        .map(|c| c[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

fn packages(texts: &[&str]) -> Vec<Package> {
    let mut found: Vec<Package> = Vec::new();
    for caps in texts.iter().flat_map(|t| RE_USEPACKAGE.captures_iter(t)) {
        let options = caps.get(1).map(|m| m.as_str().trim().to_string());
        for name in caps[2].split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if found.iter().all(|p| p.name != name) {
                found.push(Package {
                    name: name.to_string(),
                    options: options.clone().filter(|o| !o.is_empty()),
                });
            }
        }
    }
    found
}

/// Split model output into body and reusable scaffolding.
pub fn extract_boilerplate(text: &str) -> Extraction {
    let has_class = RE_DOCUMENTCLASS.is_match(text);
    let (preamble, body) = match RE_BEGIN_DOCUMENT.find(text) {
        Some(m) => (&text[..m.start()], &text[m.end()..]),
        None => ("", text),
    };
    let body = match RE_END_DOCUMENT.find(body) {
        Some(m) => &body[..m.start()],
        None => body,
    };
    let is_latex = has_class || !preamble.is_empty() || looks_like_latex(body);
    let sources = [preamble, body];

    let title = capture(&RE_TITLE, &sources);
    let author = capture(&RE_AUTHOR, &sources);
    let date = capture(&RE_DATE, &sources);
    let packages = packages(&sources);

    let mut cleaned = body.to_string();
    for re in [
        &*RE_DOCUMENTCLASS,
        &*RE_USEPACKAGE,
        &*RE_TITLE,
        &*RE_AUTHOR,
        &*RE_DATE,
        &*RE_MAKETITLE,
    ] {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    Extraction {
        body: cleaned.trim().to_string(),
        title,
        author,
        date,
        packages,
        is_latex,
    }
}
