//! Prompts sent to the vision model.
//!
//! Every prompt lives here so prompt changes never touch retry or assembly
//! code, and so unit tests can inspect them without a model.
//!
//! Callers can override the transcription prompt via
//! [`crate::config::TranscriptionConfig::prompt`].

use crate::config::OutputFormat;

const BASE_TRANSCRIPTION: &str = "You have to transcribe the handwritten notes in the image. \
The system should accurately recognize and transcribe the text displayed in the image";

const MARKDOWN_RULES: &str = r#"

Rules:
- Structure the output with a title, chapters, paragraphs and sub-paragraphs (#, ##, ###, ####).
- Use - for bullet lists and 1. 2. 3. for numbered lists, preserving nesting.
- Write mathematical expressions in LaTeX: $inline$ and $$display$$.
- Convert tables to GFM pipe tables.
- Transcribe crossed-out words only if they are still legible; otherwise skip them.
- Output ONLY the transcription. Do not wrap it in ``` fences and do not add commentary."#;

const PLAIN_TEXT_RULES: &str = r#"

Rules:
- The output must be plain text with no markup or formatting of any kind.
- Keep the line and paragraph structure of the notes.
- Output ONLY the transcription. Do not add commentary."#;

/// Prompt asking the model to transcribe one page in the markup `format` needs.
///
/// LaTeX output is produced from Markdown, so LaTeX and Markdown share a prompt.
pub fn transcription_prompt(format: OutputFormat) -> String {
    match format.requested_markup() {
        OutputFormat::PlainText => {
            format!("{BASE_TRANSCRIPTION} in plain text format.{PLAIN_TEXT_RULES}")
        }
        _ => format!("{BASE_TRANSCRIPTION} in Markdown format.{MARKDOWN_RULES}"),
    }
}

/// Prompt asking the model to enhance an excerpt of a transcription.
///
/// The page image travels with the request as context only; the model must
/// not transcribe it again.
pub fn enhancement_prompt(format: OutputFormat, input_text: &str) -> String {
    let base = format!(
        "You have to enhance this text:\n\n'''\n{input_text}\n'''\n\n\
in {label} format. Don't repeat what is displayed in the image, \
which however can provide you more context about the text to enhance. \
The system should accurately enhance the text, correct any errors, \
and provide additional information or context to the text",
        label = format.label()
    );
    match format {
        OutputFormat::PlainText => format!(
            "{base} in plain text format.\nThe output must be displayed in plain text with no markup or formatting."
        ),
        _ => format!(
            "{base}.\nThe output can contain some structured text in {} format.",
            format.label()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_and_latex_share_prompt() {
        assert_eq!(
            transcription_prompt(OutputFormat::Markdown),
            transcription_prompt(OutputFormat::Latex)
        );
        assert!(transcription_prompt(OutputFormat::Latex).contains("Markdown format"));
    }

    #[test]
    fn plain_text_prompt_forbids_markup() {
        let p = transcription_prompt(OutputFormat::PlainText);
        assert!(p.contains("plain text format"));
        assert!(p.contains("no markup"));
        assert!(!p.contains("Markdown"));
    }

    #[test]
    fn enhancement_prompt_embeds_text_and_format() {
        let p = enhancement_prompt(OutputFormat::Latex, "teorema di Bayes");
        assert!(p.contains("'''\nteorema di Bayes\n'''"));
        assert!(p.contains("in LaTeX format"));
        assert!(p.contains("structured text in LaTeX format"));
    }

    #[test]
    fn plain_enhancement_prompt_forbids_markup() {
        let p = enhancement_prompt(OutputFormat::PlainText, "x");
        assert!(p.ends_with("no markup or formatting."));
    }
}
