use thiserror::Error;

/// Errors produced while resolving an embed URL into playable sources.
///
/// `ScheduleParse` and `Carve` are handled inside the extractor's retry loop;
/// only `Exhausted`, `Transport` and `Response` cross the module boundary.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("player script has no recognizable key table: {0}")]
    ScheduleParse(String),

    #[error("password fragment out of sync with payload: {0}")]
    Carve(String),

    #[error("{host}: sources still undecryptable after {attempts} attempts; the site has probably changed its player protocol")]
    Exhausted { host: String, attempts: u32 },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Response(#[from] serde_json::Error),

    #[error("not a usable embed URL: {0}")]
    BadEmbedUrl(String),
}
