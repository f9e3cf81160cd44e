//! Response Extraction
//!
//! Models are told to answer with a bare JSON object but routinely wrap it
//! in prose or markdown fences. Extraction makes three ordered attempts and
//! the first candidate that both parses and validates wins:
//!
//! 1. the whole reply as JSON
//! 2. the interior of the first fenced block (optionally tagged `json`)
//! 3. the span from the first `{` to the last `}`
//!
//! If none of them yields a complete, valid result the caller gets
//! `GatewayError::ParseFailure` carrying the raw text. There is no fallback
//! object.

use tracing::{debug, warn};

use crate::models::TaskKind;
use crate::results::{
    BusinessModel, ClarityPlan, IdeaAnalysis, NicheValidation, StructuredResult, TaskOutput,
};
use crate::types::{GatewayError, GatewayResult};

const FENCE: &str = "```";

/// Which attempt produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Direct,
    FencedBlock,
    BraceScan,
}

/// Extract a validated `T` from a raw model reply.
pub fn extract<T: TaskOutput>(raw_text: &str) -> GatewayResult<T> {
    extract_with_strategy(raw_text).map(|(value, _)| value)
}

/// Like [`extract`], also reporting which attempt succeeded.
pub fn extract_with_strategy<T: TaskOutput>(
    raw_text: &str,
) -> GatewayResult<(T, ExtractionStrategy)> {
    let attempts = [
        (ExtractionStrategy::Direct, Some(raw_text.trim())),
        (ExtractionStrategy::FencedBlock, fenced_block(raw_text)),
        (ExtractionStrategy::BraceScan, brace_span(raw_text)),
    ];

    for (strategy, candidate) in attempts {
        let Some(candidate) = candidate else {
            continue;
        };
        match parse_candidate::<T>(candidate) {
            Ok(value) => {
                debug!(task = %T::KIND, ?strategy, "Extracted structured result");
                return Ok((value, strategy));
            }
            Err(reason) => {
                debug!(task = %T::KIND, ?strategy, %reason, "Extraction attempt failed");
            }
        }
    }

    warn!(
        task = %T::KIND,
        raw_len = raw_text.len(),
        preview = %raw_text.chars().take(200).collect::<String>(),
        "Model reply did not contain a valid result"
    );
    Err(GatewayError::ParseFailure {
        raw_text: raw_text.to_string(),
    })
}

/// Extract the result shape for `kind` from a raw model reply.
pub fn parse_structured(kind: TaskKind, raw_text: &str) -> GatewayResult<StructuredResult> {
    match kind {
        TaskKind::IdeaAnalysis => extract::<IdeaAnalysis>(raw_text).map(TaskOutput::into_structured),
        TaskKind::NicheValidation => {
            extract::<NicheValidation>(raw_text).map(TaskOutput::into_structured)
        }
        TaskKind::BusinessModel => {
            extract::<BusinessModel>(raw_text).map(TaskOutput::into_structured)
        }
        TaskKind::ClarityPlan => extract::<ClarityPlan>(raw_text).map(TaskOutput::into_structured),
    }
}

fn parse_candidate<T: TaskOutput>(candidate: &str) -> Result<T, String> {
    let value: T = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    value.validate().map_err(|e| e.to_string())?;
    Ok(value)
}

/// Interior of the first fenced block, skipping an optional `json` tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_open = &text[open + FENCE.len()..];
    let close = after_open.find(FENCE)?;
    let inner = &after_open[..close];

    let inner = match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &inner[4..],
        _ => inner,
    };
    Some(inner.trim())
}

/// Substring from the first `{` to the last `}`, inclusive.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
