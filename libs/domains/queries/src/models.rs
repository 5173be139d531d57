/// One interactive query as published to the stream
///
/// Both parts are optional on the wire. A missing vector means the embedding
/// service could not be reached, not that the event is invalid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryEvent {
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
}

impl QueryEvent {
    pub fn new(text: impl Into<String>, vector: Option<Vec<f32>>) -> Self {
        Self {
            text: Some(text.into()),
            vector,
        }
    }

    /// Event carrying only the query text
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }

    pub fn has_vector(&self) -> bool {
        self.vector.is_some()
    }
}
