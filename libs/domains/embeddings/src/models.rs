use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Usage-intent tag sent with each embedding request
///
/// Retrieval models embed stored documents and search queries slightly
/// differently; the stored corpus and the query stream must agree on the tag
/// they were produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Document,
    Query,
}

/// A vector embedding as returned by the service
///
/// Values keep the service's double precision. Narrowing happens only through
/// [`Embedding::to_f32`], at the point where a wire format requires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub model: String,
    pub values: Vec<f64>,
}

impl Embedding {
    pub fn new(model: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            model: model.into(),
            values,
        }
    }

    /// Number of components, as declared by the model's output
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Narrow every component to single precision.
    ///
    /// Uses IEEE 754 round-to-nearest, ties-to-even (the semantics of `as f32`).
    /// Magnitudes beyond `f32::MAX` become infinities. Embedding components are
    /// in [-1, 1], so in practice only the low mantissa bits are lost.
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}
