//! Object key layout for OCR output.
//!
//! For a source image `scans/photo.png` processed by job `J` under the output
//! prefix `textract-output`:
//!
//! | artifact | key |
//! |---|---|
//! | raw OCR output | `textract-output/J/1` |
//! | structured output | `textract-output/J/scans/photo.json` |
//! | plain text | `textract-output/J/scans/photo.json.postprocessed.txt` |

/// Suffix appended to the structured-output key for the plain-text artifact.
pub const POSTPROCESSED_SUFFIX: &str = ".postprocessed.txt";

/// Image extensions the OCR service accepts, lower case.
const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Unsupported object format for OCR: {0}")]
    UnsupportedFormat(String),
}

/// Every key associated with one job's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputKeys {
    pub raw: String,
    pub structured: String,
    pub text: String,
}

/// `object_key` without its extension, when that extension is a supported image type.
fn supported_stem(object_key: &str) -> Option<&str> {
    let file_name = object_key.rsplit('/').next().unwrap_or(object_key);
    let (name, extension) = file_name.rsplit_once('.')?;
    if name.is_empty() {
        return None;
    }
    let extension = extension.to_ascii_lowercase();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    Some(&object_key[..object_key.len() - extension.len() - 1])
}

/// Whether the OCR service can process this object.
pub fn is_supported(object_key: &str) -> bool {
    supported_stem(object_key).is_some()
}

/// Key layout for a job's output under `output_prefix`.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    output_prefix: String,
}

impl KeyLayout {
    pub fn new(output_prefix: impl Into<String>) -> Self {
        let output_prefix = output_prefix.into();
        Self {
            output_prefix: output_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    /// Whether `object_key` lives under the output prefix.
    pub fn is_output(&self, object_key: &str) -> bool {
        object_key
            .strip_prefix(&self.output_prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn derive(&self, job_id: &str, object_key: &str) -> Result<OutputKeys, KeyError> {
        let stem = supported_stem(object_key)
            .ok_or_else(|| KeyError::UnsupportedFormat(object_key.to_string()))?;

        let structured = format!("{}/{}/{}.json", self.output_prefix, job_id, stem);
        Ok(OutputKeys {
            raw: format!("{}/{}/1", self.output_prefix, job_id),
            text: format!("{}{}", structured, POSTPROCESSED_SUFFIX),
            structured,
        })
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new("textract-output")
    }
}
