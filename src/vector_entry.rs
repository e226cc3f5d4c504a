use crate::config::Number;
use serde::{Deserialize, Serialize};

/// A chunk's text paired with its embedding. The magnitude is computed once
/// on insert so searches only pay for the dot product.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub text: String,
    pub vector: Vec<Number>,
    pub magnitude: Number,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub score: Number,
}
