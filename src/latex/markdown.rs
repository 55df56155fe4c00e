//! Markdown → LaTeX token translation.
//!
//! Walks `pulldown-cmark` events and emits the matching LaTeX construct for
//! each one. No layout decisions are made here: the document class, fonts and
//! listing styles all come from [`super::template`].

use super::escape_latex;
use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Code blocks longer than this use the smaller `longBlock` listing style.
const LONG_BLOCK_LINES: usize = 40;

/// Languages `listings` ships a definition for, keyed by fence info string.
fn listings_language(info: &str) -> Option<&'static str> {
    let lang = info.split_whitespace().next()?.to_lowercase();
    Some(match lang.as_str() {
        "python" | "py" => "Python",
        "c" => "C",
        "c++" | "cpp" | "cxx" => "C++",
        "java" => "Java",
        "sql" => "SQL",
        "bash" | "sh" | "shell" | "zsh" => "bash",
        "html" => "HTML",
        "xml" => "XML",
        "matlab" | "octave" => "Matlab",
        "r" => "R",
        "haskell" | "hs" => "Haskell",
        "ruby" | "rb" => "Ruby",
        "perl" => "Perl",
        "php" => "PHP",
        "fortran" => "Fortran",
        "pascal" => "Pascal",
        "prolog" => "Prolog",
        "lisp" => "Lisp",
        "latex" | "tex" => "[LaTeX]TeX",
        _ => return None,
    })
}

fn sectioning_command(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "section",
        HeadingLevel::H2 => "subsection",
        HeadingLevel::H3 => "subsubsection",
        HeadingLevel::H4 => "paragraph",
        HeadingLevel::H5 | HeadingLevel::H6 => "subparagraph",
    }
}

fn column_spec(alignments: &[Alignment]) -> String {
    let mut spec = String::from("|");
    for align in alignments {
        spec.push(match align {
            Alignment::Center => 'c',
            Alignment::Right => 'r',
            Alignment::Left | Alignment::None => 'l',
        });
        spec.push('|');
    }
    spec
}

/// `\url`/`\href` take the URL verbatim except for these two.
fn escape_url(url: &str) -> String {
    url.replace('%', "\\%").replace('#', "\\#")
}

/// Translate a Markdown document into a LaTeX body (no preamble).
///
/// `$…$` and `$$…$$` are treated as maths and copied through untouched; all
/// other text has LaTeX special characters escaped.
pub fn markdown_to_latex(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_MATH);

    let mut state = LatexWriter::default();
    for event in Parser::new_ext(markdown, options) {
        state.handle(event);
    }
    state.finish()
}

/// Translation state.
///
/// Link and image text is captured into its own buffer so it can be placed
/// after the URL (or dropped, for images).
#[derive(Default)]
struct LatexWriter {
    buffers: Vec<String>,
    /// `true` for ordered lists, innermost last.
    lists: Vec<bool>,
    /// Destination of each open link.
    links: Vec<String>,
    /// Source of the code block being read, and its listings language.
    code_block: Option<String>,
    code_lang: Option<&'static str>,
    in_table_head: bool,
    cell_index: usize,
}

impl LatexWriter {
    fn out(&mut self) -> &mut String {
        if self.buffers.is_empty() {
            self.buffers.push(String::new());
        }
        let last = self.buffers.len() - 1;
        &mut self.buffers[last]
    }

    fn write(&mut self, s: &str) {
        self.out().push_str(s);
    }

    fn ensure_newline(&mut self) {
        let out = self.out();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
    }

    fn in_table(&self) -> bool {
        self.cell_index > 0 || self.in_table_head
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code_block.as_mut() {
                Some(code) => code.push_str(&text),
                None => {
                    let escaped = escape_latex(&text);
                    self.write(&escaped);
                }
            },
            Event::Code(code) => {
                let escaped = escape_latex(&code);
                self.write(&format!("\\texttt{{{escaped}}}"));
            }
            Event::InlineMath(math) => self.write(&format!("${math}$")),
            Event::DisplayMath(math) => self.write(&format!("\\[{}\\]", math.trim())),
            Event::SoftBreak => self.write("\n"),
            Event::HardBreak => {
                if self.in_table() {
                    self.write(" ");
                } else {
                    self.write("\\\\\n");
                }
            }
            Event::Rule => {
                self.ensure_newline();
                self.write("\\begin{center}\\rule{0.5\\linewidth}{0.5pt}\\end{center}\n\n");
            }
            Event::TaskListMarker(done) => {
                self.write(if done { "$\\boxtimes$ " } else { "$\\square$ " });
            }
            // Raw HTML has no LaTeX meaning; footnotes are not enabled.
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.ensure_newline();
                self.write(&format!("\\{}{{", sectioning_command(level)));
            }
            Tag::BlockQuote { .. } => {
                self.ensure_newline();
                self.write("\\begin{quote}\n");
            }
            Tag::CodeBlock(kind) => {
                self.ensure_newline();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => listings_language(&info),
                    CodeBlockKind::Indented => None,
                };
                self.code_lang = lang;
                self.code_block = Some(String::new());
            }
            Tag::List(first) => {
                self.ensure_newline();
                match first {
                    Some(start) => {
                        let depth = self.lists.iter().filter(|ordered| **ordered).count();
                        self.write("\\begin{enumerate}\n");
                        if start != 1 && depth < 4 {
                            let counter = ["enumi", "enumii", "enumiii", "enumiv"][depth];
                            self.write(&format!(
                                "\\setcounter{{{counter}}}{{{}}}\n",
                                start.saturating_sub(1)
                            ));
                        }
                        self.lists.push(true);
                    }
                    None => {
                        self.write("\\begin{itemize}\n");
                        self.lists.push(false);
                    }
                }
            }
            Tag::Item => {
                self.ensure_newline();
                self.write("\\item ");
            }
            Tag::Table(alignments) => {
                self.ensure_newline();
                self.write(&format!(
                    "\\begin{{center}}\n\\begin{{tabular}}{{{}}}\n\\hline\n",
                    column_spec(&alignments)
                ));
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.cell_index = 0;
            }
            Tag::TableRow => self.cell_index = 0,
            Tag::TableCell => {
                if self.cell_index > 0 {
                    self.write(" & ");
                }
                self.cell_index += 1;
                if self.in_table_head {
                    self.write("\\textbf{");
                }
            }
            Tag::Emphasis => self.write("\\emph{"),
            Tag::Strong => self.write("\\textbf{"),
            Tag::Strikethrough => self.write("\\sout{"),
            Tag::Link { dest_url, .. } => {
                self.links.push(dest_url.to_string());
                self.buffers.push(String::new());
            }
            Tag::Image { .. } => self.buffers.push(String::new()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.write("\n\n");
                } else {
                    self.write("\n");
                }
            }
            TagEnd::Heading(_) => self.write("}\n\n"),
            TagEnd::BlockQuote { .. } => {
                self.ensure_newline();
                self.write("\\end{quote}\n\n");
            }
            TagEnd::CodeBlock => {
                let code = self.code_block.take().unwrap_or_default();
                let mut opts = Vec::new();
                if code.lines().count() > LONG_BLOCK_LINES {
                    opts.push("style=longBlock".to_string());
                }
                if let Some(lang) = self.code_lang.take() {
                    opts.push(format!("language={{{lang}}}"));
                }
                if opts.is_empty() {
                    self.write("\\begin{lstlisting}\n");
                } else {
                    self.write(&format!("\\begin{{lstlisting}}[{}]\n", opts.join(", ")));
                }
                self.write(&code);
                self.ensure_newline();
                self.write("\\end{lstlisting}\n\n");
            }
            TagEnd::List(ordered) => {
                self.lists.pop();
                self.ensure_newline();
                self.write(if ordered { "\\end{enumerate}\n" } else { "\\end{itemize}\n" });
                if self.lists.is_empty() {
                    self.write("\n");
                }
            }
            TagEnd::Item => self.ensure_newline(),
            TagEnd::Table => {
                self.cell_index = 0;
                self.write("\\end{tabular}\n\\end{center}\n\n");
            }
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.write(" \\\\\n\\hline\n");
            }
            TagEnd::TableRow => self.write(" \\\\\n\\hline\n"),
            TagEnd::TableCell => {
                if self.in_table_head {
                    self.write("}");
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.write("}"),
            TagEnd::Link => {
                let text = self.buffers.pop().unwrap_or_default();
                let url = self.links.pop().unwrap_or_default();
                let link = if text.is_empty() || text == escape_latex(&url) {
                    format!("\\url{{{}}}", escape_url(&url))
                } else {
                    format!("\\href{{{}}}{{{}}}", escape_url(&url), text)
                };
                self.write(&link);
            }
            TagEnd::Image => {
                let alt = self.buffers.pop().unwrap_or_default();
                if !alt.trim().is_empty() {
                    self.write(&format!("\\emph{{{}}}", alt.trim()));
                }
            }
            _ => {}
        }
    }

    /// Joins the output and squeezes runs of blank lines to one, leaving
    /// listing bodies untouched.
    fn finish(mut self) -> String {
        let body = self.buffers.drain(..).collect::<String>();
        let mut out = String::with_capacity(body.len());
        let mut in_listing = false;
        let mut blank_run = 0;
        for line in body.trim().lines() {
            if in_listing {
                if line == "\\end{lstlisting}" {
                    in_listing = false;
                }
            } else if line.starts_with("\\begin{lstlisting}") {
                in_listing = true;
                blank_run = 0;
            } else if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
