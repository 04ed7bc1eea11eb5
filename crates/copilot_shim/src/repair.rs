use copilot::{patch_commas, strip_code_fence};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepairError {
    #[error("no braces found")]
    NoBraces,
    #[error("repaired reply is not valid JSON: {0}")]
    Invalid(String),
}

/// Fence strip and comma patch, then the span from the first `{` to the last
/// `}`, which must parse as JSON.
pub fn validated_json(text: &str) -> Result<String, RepairError> {
    let patched = patch_commas(strip_code_fence(text));
    let (Some(first), Some(last)) = (patched.find('{'), patched.rfind('}')) else {
        return Err(RepairError::NoBraces);
    };
    if last < first {
        return Err(RepairError::NoBraces);
    }
    let span = &patched[first..=last];
    serde_json::from_str::<serde_json::Value>(span)
        .map_err(|error| RepairError::Invalid(error.to_string()))?;
    Ok(span.to_string())
}
