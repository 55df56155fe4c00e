//! Deterministic cleanup of model output, one page at a time.
//!
//! Vision models add their own packaging around a transcription: code fences
//! despite being told not to, CRLF line endings, zero-width characters copied
//! from training data, invented `![figure](figure.png)` links for sketches
//! they cannot express in text. The rules here remove that packaging without
//! touching the transcribed words.
//!
//! Rules run in a fixed order. Fences are stripped before anything else so
//! heading and table detection see the real first line; the final-newline
//! pass always runs last.

use crate::config::OutputFormat;
use once_cell::sync::Lazy;
use regex::Regex;

type Rule = fn(&str) -> String;

/// Applied to every format.
const LEADING: &[Rule] = &[
    strip_outer_fence,
    normalise_line_endings,
    trim_trailing_whitespace,
    collapse_blank_lines,
];

/// Applied when the model was asked for Markdown (Markdown and LaTeX output).
const MARKDOWN: &[Rule] = &[
    space_headings,
    insert_missing_table_separator,
    drop_extra_table_separators,
    replace_image_links,
];

const TRAILING: &[Rule] = &[remove_invisible_chars, ensure_final_newline];

/// Clean one page of model output produced for `format`.
pub fn clean_transcription(raw: &str, format: OutputFormat) -> String {
    let markdown_rules: &[Rule] = match format.requested_markup() {
        OutputFormat::Markdown => MARKDOWN,
        _ => &[],
    };

    LEADING
        .iter()
        .chain(markdown_rules)
        .chain(TRAILING)
        .fold(raw.to_string(), |text, rule| rule(&text))
}

// ── Shared rules ─────────────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[ \t]*(?:markdown|md|latex|tex|text|plaintext|plain)?[ \t]*\r?\n(.*?)\r?\n```\s*$")
        .expect("valid fence regex")
});

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

/// At most two blank lines in a row.
fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").into_owned()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'],
        "",
    )
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        "\n".to_string()
    } else {
        format!("{trimmed}\n")
    }
}

// ── Markdown rules ───────────────────────────────────────────────────────────

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// Blank line before every ATX heading outside code blocks.
fn space_headings(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 32);
    let mut in_code = false;

    for line in input.lines() {
        if is_fence(line) {
            in_code = !in_code;
        }
        if !in_code && is_heading(line) && !out.is_empty() {
            let kept = out.trim_end_matches('\n').len();
            out.truncate(kept);
            out.push_str("\n\n");
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|')
        && t.contains('-')
        && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// A table whose header row is directly followed by a body row gets a
/// `| --- |` row so renderers recognise it as a table.
fn insert_missing_table_separator(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);

    for (i, line) in lines.iter().enumerate() {
        out.push((*line).to_string());

        let starts_table = is_table_row(line)
            && !is_separator_row(line)
            && !i.checked_sub(1).is_some_and(|p| is_table_row(lines[p]));
        let next = lines.get(i + 1).copied().unwrap_or("");
        if starts_table && is_table_row(next) && !is_separator_row(next) {
            let columns = line.trim().matches('|').count().saturating_sub(1).max(1);
            out.push(format!("|{}", " --- |".repeat(columns)));
        }
    }
    out.join("\n")
}

/// Only the separator right after the header row survives.
fn drop_extra_table_separators(input: &str) -> String {
    let mut row_in_table = 0usize;
    input
        .lines()
        .filter(|line| {
            if !is_table_row(line) {
                row_in_table = 0;
                return true;
            }
            row_in_table += 1;
            !(is_separator_row(line) && row_in_table != 2)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_IMAGE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

/// Scanned notes have no image files behind them: any image link is
/// invented. Keep the description as italic text.
fn replace_image_links(input: &str) -> String {
    RE_IMAGE_LINK
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if alt.is_empty() {
                String::new()
            } else {
                format!("*{alt}*")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_and_latex_fences() {
        assert_eq!(strip_outer_fence("```markdown\n# Ciao\nmondo\n```"), "# Ciao\nmondo");
        assert_eq!(strip_outer_fence("```latex\n\\section{A}\n```\n"), "\\section{A}");
        assert_eq!(strip_outer_fence("```\nplain\n```"), "plain");
    }

    #[test]
    fn inner_code_blocks_are_kept() {
        let input = "Testo\n```python\nprint(1)\n```";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn line_endings_and_trailing_space() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(trim_trailing_whitespace("  a   \nb\t"), "  a\nb");
    }

    #[test]
    fn blank_lines_are_collapsed() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn headings_get_spacing_outside_code() {
        let out = space_headings("testo\n## Capitolo\n```\n# commento\n```");
        assert!(out.contains("testo\n\n## Capitolo"));
        assert!(out.contains("```\n# commento\n```"));
        assert!(!is_heading("#hashtag"));
        assert!(!is_heading("####### seven"));
    }

    #[test]
    fn missing_separator_is_inserted_once() {
        let out = insert_missing_table_separator("| A | B |\n| 1 | 2 |\n| 3 | 4 |");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[3], "| 3 | 4 |");
    }

    #[test]
    fn well_formed_table_is_untouched() {
        let table = "| H1 | H2 |\n| --- | --- |\n| a | b |";
        assert_eq!(insert_missing_table_separator(table), table);
        assert_eq!(drop_extra_table_separators(table), table);
    }

    #[test]
    fn extra_separators_are_dropped() {
        let out = drop_extra_table_separators("| A |\n| --- |\n| 1 |\n| --- |\n| 2 |");
        assert_eq!(out.lines().filter(|l| is_separator_row(l)).count(), 1);
        assert!(out.ends_with("| 2 |"));
    }

    #[test]
    fn image_links_become_captions() {
        assert_eq!(
            replace_image_links("vedi ![Grafico della funzione](grafico.png)"),
            "vedi *Grafico della funzione*"
        );
        assert_eq!(replace_image_links("![](x.png)"), "");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d"), "abcd");
    }

    #[test]
    fn final_newline() {
        assert_eq!(ensure_final_newline("x\n\n\n"), "x\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn markdown_pipeline() {
        let raw = "```markdown\n# Titolo\r\nTesto   \n\n\n\n\n\n## Sezione\n| A | B |\n| 1 | 2 |\n```";
        let out = clean_transcription(raw, OutputFormat::Markdown);
        assert!(out.starts_with("# Titolo\n"));
        assert!(out.contains("Testo\n\n## Sezione"));
        assert!(out.contains("| --- | --- |"));
        assert!(out.ends_with("| 1 | 2 |\n"));
    }

    #[test]
    fn plain_text_skips_markdown_rules() {
        let raw = "```text\nappunti\n![non un'immagine](x)\n```";
        let out = clean_transcription(raw, OutputFormat::PlainText);
        assert_eq!(out, "appunti\n![non un'immagine](x)\n");
    }

    #[test]
    fn latex_output_uses_markdown_rules() {
        let out = clean_transcription("# A\n![fig](f.png)", OutputFormat::Latex);
        assert_eq!(out, "# A\n*fig*\n");
    }
}
