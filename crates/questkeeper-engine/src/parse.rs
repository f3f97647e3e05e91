use questkeeper_core::ports::CompletionOutput;
use questkeeper_core::EngineError;

/// Parses a completion's raw text into the structured instructions Phase C
/// acts on. The wire format is a single JSON object matching
/// [`CompletionOutput`] — whatever prompt-engineering coerces the model
/// into emitting that shape is a Phase-B concern, not this function's.
pub fn parse_completion(raw_text: &str) -> Result<CompletionOutput, EngineError> {
    let trimmed = raw_text.trim();
    let trimmed = strip_code_fence(trimmed);

    let output: CompletionOutput = serde_json::from_str(trimmed)
        .map_err(|e| EngineError::BadModelOutput(format!("invalid completion json: {e}")))?;

    if output.narration.trim().is_empty() {
        return Err(EngineError::BadModelOutput(
            "narration field was empty".to_string(),
        ));
    }

    Ok(output)
}

/// Models are prone to wrapping JSON in ```json fences despite instructions
/// not to. Strip a single leading/trailing fence if present.
fn strip_code_fence(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}
