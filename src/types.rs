use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One playable link from the decrypted (or plain) sources array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSource {
    pub file: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Subtitle/thumbnail track shipped alongside the sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// Final playable representation: decrypted sources merged with the outer
/// response's tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoList {
    pub sources: Vec<VideoSource>,
    pub tracks: Vec<Track>,
}

/// Raw body of the getSources endpoint. `sources` is a JSON-encoded string
/// when `encrypted` is true, and a plain array otherwise, so it stays a
/// `Value` until the extractor knows which.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub encrypted: bool,
    pub sources: Value,
    #[serde(default)]
    pub tracks: Vec<Track>,
}
