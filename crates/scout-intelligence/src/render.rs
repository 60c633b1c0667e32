//! Plain-text rendering of a final answer for presentation layers.

use scout_core::StructuredResult;

/// Confidence above which the footer is shown.
pub const CONFIDENCE_FOOTER_THRESHOLD: f64 = 0.7;

/// Numbered "Sources" block, or an empty string when there are none.
pub fn format_sources(sources: &[String]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\n**Sources:**\n");
    for (i, source) in sources.iter().enumerate() {
        out.push_str(&format!("{}. {source}\n", i + 1));
    }
    out
}

pub fn confidence_footer(confidence: f64) -> Option<String> {
    (confidence > CONFIDENCE_FOOTER_THRESHOLD).then(|| format!("\n\n*Confidence: {confidence:.2}*"))
}

pub fn render_answer(result: &StructuredResult) -> String {
    let mut out = result.answer.clone();
    out.push_str(&format_sources(&result.sources));
    if let Some(footer) = confidence_footer(result.confidence) {
        out.push_str(&footer);
    }
    out
}
