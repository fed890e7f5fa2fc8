use serde::Deserialize;

/// Structured output written by the OCR service for one job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StructuredOutput {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// One detected block. Only the recognized text matters here; page, line and
/// geometry attributes are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    #[serde(default)]
    pub text: Option<String>,
}

impl StructuredOutput {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Recognized text fragments in document order, newline separated.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
