//! OCR output documents and notification payloads used across tests.

#![allow(dead_code)]

/// Structured output mixing text blocks with a block whose text is null.
pub const OUTPUT_WITH_NULL_BLOCK: &[u8] =
    br#"{"Blocks":[{"Text":"A"},{"Text":null},{"Text":"B"}]}"#;

/// A page with lines and words, as the OCR service writes it.
pub const RECEIPT_OUTPUT: &[u8] = br#"{
    "DocumentMetadata": {"Pages": 1},
    "JobStatus": "SUCCEEDED",
    "Blocks": [
        {"BlockType": "PAGE", "Id": "page-1"},
        {"BlockType": "LINE", "Id": "l1", "Text": "Jane Doe", "Confidence": 99.2},
        {"BlockType": "LINE", "Id": "l2", "Text": "SSN 123-45-6789", "Confidence": 98.7},
        {"BlockType": "LINE", "Id": "l3", "Text": "Card 4111 1111 1111 1111", "Confidence": 97.9}
    ]
}"#;

pub const MALFORMED_OUTPUT: &[u8] = br#"{"Blocks": {"Text": "not a list"}}"#;

/// Bare completion message published by the OCR service.
pub fn completion_message(job_id: &str, object_key: &str, status: &str) -> String {
    serde_json::json!({
        "JobId": job_id,
        "Status": status,
        "API": "StartDocumentTextDetection",
        "JobTag": "",
        "Timestamp": 1767225600000u64,
        "DocumentLocation": {
            "S3ObjectName": object_key,
            "S3Bucket": crate::helpers::BUCKET
        }
    })
    .to_string()
}

/// Topic envelope wrapping several completion messages.
pub fn topic_envelope(messages: &[String]) -> String {
    let records: Vec<_> = messages
        .iter()
        .map(|m| serde_json::json!({ "EventSource": "aws:sns", "Sns": { "Message": m } }))
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}
