use serde::de::DeserializeOwned;

use redlease_store::StoreError;

/// A sorted set member decoded from JSON, with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredValue<T> {
    pub value: T,
    pub score: f64,
}

/// Decode `(member, score)` pairs whose members are JSON documents.
///
/// Fails on the first member that does not parse as `T`.
pub fn decode_scored<T: DeserializeOwned>(
    members: Vec<(String, f64)>,
) -> Result<Vec<ScoredValue<T>>, StoreError> {
    members
        .into_iter()
        .map(|(member, score)| {
            serde_json::from_str(&member)
                .map(|value| ScoredValue { value, score })
                .map_err(|e| StoreError::Serialization(format!("member {member:?}: {e}")))
        })
        .collect()
}

/// Decode JSON members, dropping their scores.
pub fn decode_members<T: DeserializeOwned>(
    members: Vec<(String, f64)>,
) -> Result<Vec<T>, StoreError> {
    Ok(decode_scored(members)?
        .into_iter()
        .map(|scored| scored.value)
        .collect())
}
