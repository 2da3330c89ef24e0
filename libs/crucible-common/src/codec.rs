// Test case wire format
//
// Challenges store their test cases as a JSON array of
// {"Input": ..., "ExpectedOutput": ...} objects.

use crate::types::TestCase;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed test case data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode the serialized test case set, preserving order
///
/// An empty array decodes to an empty Vec; deciding whether that is an
/// error is left to the caller.
pub fn decode(raw: &str) -> Result<Vec<TestCase>, CodecError> {
    let test_cases: Vec<TestCase> = serde_json::from_str(raw)?;
    Ok(test_cases)
}

/// Serialize test cases into the canonical wire format
pub fn encode(test_cases: &[TestCase]) -> String {
    // Vec<TestCase> of plain strings cannot fail to serialize
    serde_json::to_string(test_cases).unwrap_or_else(|_| "[]".to_string())
}
