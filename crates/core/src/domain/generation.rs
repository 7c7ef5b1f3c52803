use serde::{Deserialize, Serialize};

/// Normalized output of one generation call. Consumed once, never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    /// Length in characters.
    pub length: usize,
    pub token_cost: u32,
    pub model: String,
}

impl GeneratedText {
    pub fn new(text: impl Into<String>, token_cost: u32, model: impl Into<String>) -> Self {
        let text = text.into();
        let length = text.chars().count();
        Self { text, length, token_cost, model: model.into() }
    }
}
