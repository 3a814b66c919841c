//! System instructions sent to the model gateway.
//!
//! Every stage of Super Mode and every single-shot mode pulls its wording
//! from here so prompt changes stay in one file.

use crate::pipeline::types::{GenerationResult, PromptAnalysis};
use crate::types::ResponseType;

pub const CHAT_SYSTEM: &str = "You are Pencil, a helpful AI assistant. Answer clearly and accurately, \
using markdown where it helps readability.";

pub const CODE_GENERATION_SYSTEM: &str = "You are an expert software engineer. Write clean, \
well-structured, production-quality code that solves the user's request. Include brief comments \
where they aid understanding and wrap code in fenced markdown blocks with a language tag.";

pub const ANALYSIS_SYSTEM: &str = r#"You are a prompt analyst for an AI assistant that can answer with text, write code, or generate images.
Classify the user's prompt and respond with a single JSON object and nothing else:
{
  "responseType": "code" | "image" | "text",
  "complexity": "simple" | "moderate" | "complex",
  "reasoning": "one or two sentences explaining the classification",
  "enhancedPrompt": "the prompt rewritten to get the best result for the chosen response type",
  "suggestedModels": ["model names best suited to the task, most suitable first"],
  "confidence": 0.0 to 1.0
}"#;

pub const COMPREHENSIVE_SYSTEM: &str = "You are an expert assistant. Give a comprehensive, \
well-organized response that covers the question thoroughly, including relevant context, \
examples and caveats.";

pub const CODE_REVIEW_SYSTEM: &str = "You are a senior code reviewer. Review the implementation \
you are given, point out bugs, edge cases and performance issues, then propose an alternative \
implementation that addresses them.";

pub const ALTERNATIVE_PERSPECTIVE_SYSTEM: &str = "You are a critical thinker. Offer an \
alternative perspective on the request: additional insights, counterpoints, or angles a first \
answer is likely to miss.";

pub const SYNTHESIS_SYSTEM: &str = "You are a synthesis expert. Combine the primary response and \
the alternative response into one final answer that keeps the best of both, resolves \
contradictions, and reads as a single coherent response. Do not mention that multiple responses \
were combined.";

/// User turn for the code review pass.
pub fn code_review_request(enhanced_prompt: &str, primary_code: &str) -> String {
    format!(
        "Original request:\n{enhanced_prompt}\n\nImplementation to review:\n{primary_code}\n\n\
Review this implementation and provide an improved alternative."
    )
}

/// User turn for the alternative perspective pass.
pub fn alternative_perspective_request(enhanced_prompt: &str) -> String {
    format!(
        "Provide an alternative perspective and additional insights on the following request:\n\n{enhanced_prompt}"
    )
}

/// User turn for the synthesis pass.
pub fn synthesis_request(
    prompt: &str,
    analysis: &PromptAnalysis,
    primary: &GenerationResult,
    alternative: Option<&GenerationResult>,
) -> String {
    let mut out = format!(
        "Original prompt:\n{prompt}\n\nAnalysis:\n{}\n\nPrimary response:\n{}",
        analysis.reasoning, primary.content
    );
    if let Some(alt) = alternative {
        out.push_str("\n\nAlternative response:\n");
        out.push_str(&alt.content);
    }
    out.push_str(match analysis.response_type {
        ResponseType::Code => "\n\nProduce the final, best implementation with a short explanation.",
        _ => "\n\nProduce the final, best response.",
    });
    out
}

/// Caption attached to image results in place of a synthesized answer.
pub fn image_caption(prompt: &str) -> String {
    format!("Here is the image generated for: \"{prompt}\"")
}
