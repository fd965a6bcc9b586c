use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use urlencoding::encode;

use crate::cache::{FetchScript, ScheduleCache};
use crate::carve::carve;
use crate::cipher::{Cipher, SaltedCipher};
use crate::error::ExtractError;
use crate::keys::KeySchedule;
use crate::types::{SourcesResponse, VideoList, VideoSource};
use crate::util;

const UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0 Safari/537.36";

/// Attempt cap for the decrypt loop. Each failed attempt throws the cached
/// schedule away and re-derives it from a fresh copy of the player script.
pub const MAX_DECRYPT_ATTEMPTS: u32 = 3;

/// The two calls the engine makes against an embed host.
pub trait EmbedApi: FetchScript {
    async fn fetch_sources(&self, id: &str) -> Result<SourcesResponse, ExtractError>;
}

fn default_headers(base: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(UA));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    let referer = std::env::var("UNEMBED_REFERER").unwrap_or_else(|_| format!("{}/", base));
    if let Ok(hv) = HeaderValue::from_str(&referer) {
        headers.insert(REFERER, hv);
    }
    headers
}

/// reqwest-backed `EmbedApi` for a single embed host.
pub struct HttpEmbedApi {
    client: reqwest::Client,
    base: String,
}

impl HttpEmbedApi {
    pub fn new(base: &str) -> Self {
        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers(base))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true);
        if let Ok(proxy) = std::env::var("UNEMBED_HTTP_PROXY") {
            if let Ok(px) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(px);
            }
        }
        Self { client: builder.build().expect("client build"), base: base.to_string() }
    }

    fn script_url(&self) -> String {
        std::env::var("UNEMBED_PLAYER_JS")
            .unwrap_or_else(|_| format!("{}/js/player/prod/e4-player.min.js", self.base))
    }
}

impl FetchScript for HttpEmbedApi {
    async fn fetch_script(&self) -> Result<String, ExtractError> {
        let url = self.script_url();
        util::debug(format!("fetching player script: {}", url));
        Ok(self.client.get(&url).send().await?.error_for_status()?.text().await?)
    }
}

impl EmbedApi for HttpEmbedApi {
    async fn fetch_sources(&self, id: &str) -> Result<SourcesResponse, ExtractError> {
        let url = format!("{}/ajax/embed-4/getSources?id={}", self.base, encode(id));
        util::debug(format!("fetching sources: {}", url));
        let body = self
            .client
            .get(&url)
            .header("x-requested-with", "XMLHttpRequest")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Resolves embed URLs into playable video lists.
///
/// Owns the schedule cache for its host, so callers sharing one `Extractor`
/// share one cached schedule.
pub struct Extractor<A, C> {
    api: A,
    cipher: C,
    cache: ScheduleCache,
    host: String,
}

impl Extractor<HttpEmbedApi, SaltedCipher> {
    /// Engine wired for real use, with the host taken from the embed URL.
    pub fn from_embed_url(url: &str) -> Result<Self, ExtractError> {
        let base = base_of(url)?;
        let api = HttpEmbedApi::new(&base);
        Ok(Self::new(api, SaltedCipher, base))
    }
}

impl<A: EmbedApi, C: Cipher> Extractor<A, C> {
    pub fn new(api: A, cipher: C, host: String) -> Self {
        Self { api, cipher, cache: ScheduleCache::new(), host }
    }

    /// Current key schedule, computed on demand. Exposed for the `schedule`
    /// subcommand.
    pub async fn key_schedule(&self) -> Result<KeySchedule, ExtractError> {
        self.cache.get(&self.api).await
    }

    /// Fetches, decrypts and decodes the video list behind an embed URL.
    ///
    /// Any recoverable failure (unparseable script, desynced carve, empty
    /// plaintext) discards the cached schedule and re-runs the whole attempt,
    /// up to `MAX_DECRYPT_ATTEMPTS`. Transport and response-shape errors are
    /// not retried here.
    pub async fn video_list(&self, embed_url: &str) -> Result<VideoList, ExtractError> {
        let id = embed_id(embed_url)?;

        for attempt in 1..=MAX_DECRYPT_ATTEMPTS {
            util::debug(format!("attempt {}/{} for id {}", attempt, MAX_DECRYPT_ATTEMPTS, id));

            let schedule = match self.cache.get(&self.api).await {
                Ok(s) => s,
                Err(ExtractError::ScheduleParse(reason)) => {
                    util::debug(format!("schedule parse failed: {}", reason));
                    continue;
                }
                Err(other) => return Err(other),
            };

            let resp = self.api.fetch_sources(&id).await?;
            if !resp.encrypted {
                let sources: Vec<VideoSource> = serde_json::from_value(resp.sources)?;
                return Ok(VideoList { sources, tracks: resp.tracks });
            }

            let payload: String = serde_json::from_value(resp.sources)?;
            let carved = match carve(&payload, &schedule) {
                Ok(c) => c,
                Err(err) => {
                    util::debug(format!("carve failed: {}", err));
                    self.cache.invalidate().await;
                    continue;
                }
            };

            let plaintext = self.cipher.decrypt(&carved.ciphertext, &carved.password);
            if plaintext.is_empty() {
                util::debug("decryption produced empty plaintext, schedule is stale");
                self.cache.invalidate().await;
                continue;
            }

            let sources: Vec<VideoSource> = serde_json::from_str(&plaintext)?;
            return Ok(VideoList { sources, tracks: resp.tracks });
        }

        Err(ExtractError::Exhausted { host: self.host.clone(), attempts: MAX_DECRYPT_ATTEMPTS })
    }
}

fn base_of(url: &str) -> Result<String, ExtractError> {
    let re = Regex::new(r"^(https?://[^/]+)").unwrap();
    re.captures(url)
        .map(|c| c[1].to_string())
        .ok_or_else(|| ExtractError::BadEmbedUrl(url.to_string()))
}

fn embed_id(url: &str) -> Result<String, ExtractError> {
    let base = base_of(url)?;
    let path = url[base.len()..].split(['?', '#']).next().unwrap_or("");
    path.trim_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .ok_or_else(|| ExtractError::BadEmbedUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Track;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCRIPT: &str = "const Dk=0x9e,mF=0x2,qL=0x0,Zp=0x3,vB=0x5,Jw=window.kv();";
    const PAYLOAD: &str = "ABwxyzCD12345EF";
    const PASSWORD: &str = "ABD12";
    const PLAINTEXT: &str = r#"[{"file":"https://example.org/stream/master.m3u8"}]"#;
    const EMBED_URL: &str = "https://host.example/v4/embed-4/xyzID123?z=";

    struct MockApi {
        encrypted: bool,
        script: &'static str,
        payload: &'static str,
        script_fetches: AtomicUsize,
        source_fetches: AtomicUsize,
    }

    impl MockApi {
        fn new(encrypted: bool) -> Self {
            Self::with_fixtures(encrypted, SCRIPT, PAYLOAD)
        }

        fn with_fixtures(encrypted: bool, script: &'static str, payload: &'static str) -> Self {
            Self {
                encrypted,
                script,
                payload,
                script_fetches: AtomicUsize::new(0),
                source_fetches: AtomicUsize::new(0),
            }
        }
    }

    impl FetchScript for MockApi {
        async fn fetch_script(&self) -> Result<String, ExtractError> {
            self.script_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.to_string())
        }
    }

    impl EmbedApi for MockApi {
        async fn fetch_sources(&self, id: &str) -> Result<SourcesResponse, ExtractError> {
            assert_eq!(id, "xyzID123");
            self.source_fetches.fetch_add(1, Ordering::SeqCst);
            let sources = if self.encrypted {
                json!(self.payload)
            } else {
                json!([{ "file": "https://example.org/plain.m3u8" }])
            };
            Ok(SourcesResponse {
                encrypted: self.encrypted,
                sources,
                tracks: vec![Track {
                    file: "https://example.org/subs-en.vtt".into(),
                    label: Some("English".into()),
                    kind: Some("captions".into()),
                    default: true,
                }],
            })
        }
    }

    /// Succeeds only when handed the password the fixture schedule carves.
    struct CheckingCipher;
    impl Cipher for CheckingCipher {
        fn decrypt(&self, ciphertext: &str, password: &str) -> String {
            assert_eq!(ciphertext, "wxyzC345EF");
            if password == PASSWORD { PLAINTEXT.to_string() } else { String::new() }
        }
    }

    struct FailingCipher {
        calls: AtomicUsize,
    }
    impl Cipher for FailingCipher {
        fn decrypt(&self, _ciphertext: &str, _password: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            String::new()
        }
    }

    /// Fails the first `until` calls, then behaves.
    struct FlakyCipher {
        calls: AtomicUsize,
        until: usize,
    }
    impl Cipher for FlakyCipher {
        fn decrypt(&self, _ciphertext: &str, _password: &str) -> String {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.until { String::new() } else { PLAINTEXT.to_string() }
        }
    }

    #[tokio::test]
    async fn happy_path_decrypts_and_merges_tracks() {
        let ex = Extractor::new(MockApi::new(true), CheckingCipher, "host.example".into());
        let list = ex.video_list(EMBED_URL).await.unwrap();
        assert_eq!(list.sources.len(), 1);
        assert_eq!(list.sources[0].file, "https://example.org/stream/master.m3u8");
        assert_eq!(list.tracks.len(), 1);
        assert_eq!(list.tracks[0].label.as_deref(), Some("English"));
    }

    #[tokio::test]
    async fn unencrypted_response_bypasses_decryption() {
        struct PanicCipher;
        impl Cipher for PanicCipher {
            fn decrypt(&self, _: &str, _: &str) -> String {
                panic!("cipher must not run for unencrypted responses");
            }
        }

        let ex = Extractor::new(MockApi::new(false), PanicCipher, "host.example".into());
        let list = ex.video_list(EMBED_URL).await.unwrap();
        assert_eq!(list.sources[0].file, "https://example.org/plain.m3u8");
    }

    #[tokio::test]
    async fn persistent_failure_stops_after_attempt_cap() {
        let api = MockApi::new(true);
        let cipher = FailingCipher { calls: AtomicUsize::new(0) };
        let ex = Extractor::new(api, cipher, "host.example".into());

        let err = ex.video_list(EMBED_URL).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Exhausted { attempts: MAX_DECRYPT_ATTEMPTS, .. }
        ));
        assert_eq!(ex.cipher.calls.load(Ordering::SeqCst), 3);
        // Every failed attempt invalidates, so the script is re-fetched each
        // time around.
        assert_eq!(ex.api.script_fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn carve_failure_invalidates_and_exhausts() {
        struct UnreachedCipher;
        impl Cipher for UnreachedCipher {
            fn decrypt(&self, _: &str, _: &str) -> String {
                panic!("cipher must not run when carving fails");
            }
        }

        // Schedule window far wider than the payload, so every attempt fails
        // in the carve step rather than in the cipher.
        let api =
            MockApi::with_fixtures(true, "const k=0x9e,a=0x20,b=0x0,t=f();", "short");
        let ex = Extractor::new(api, UnreachedCipher, "host.example".into());

        let err = ex.video_list(EMBED_URL).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Exhausted { attempts: MAX_DECRYPT_ATTEMPTS, .. }
        ));
        // Each carve failure invalidates the schedule, so the script is
        // re-fetched on every attempt.
        assert_eq!(ex.api.script_fetches.load(Ordering::SeqCst), 3);
        assert_eq!(ex.api.source_fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_when_a_fresh_schedule_works() {
        let api = MockApi::new(true);
        let cipher = FlakyCipher { calls: AtomicUsize::new(0), until: 1 };
        let ex = Extractor::new(api, cipher, "host.example".into());

        let list = ex.video_list(EMBED_URL).await.unwrap();
        assert_eq!(list.sources.len(), 1);
        assert_eq!(ex.api.script_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(ex.cipher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeat_calls_reuse_the_cached_schedule() {
        let ex = Extractor::new(MockApi::new(true), CheckingCipher, "host.example".into());
        ex.video_list(EMBED_URL).await.unwrap();
        ex.video_list(EMBED_URL).await.unwrap();
        assert_eq!(ex.api.script_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(ex.api.source_fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn base_and_id_come_from_the_embed_url() {
        assert_eq!(base_of(EMBED_URL).unwrap(), "https://host.example");
        assert_eq!(embed_id(EMBED_URL).unwrap(), "xyzID123");
        assert_eq!(embed_id("https://host.example/e/abc#frag").unwrap(), "abc");
        assert!(base_of("not a url").is_err());
        assert!(embed_id("https://host.example").is_err());
    }
}
