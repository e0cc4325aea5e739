use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Result, ScrapeError};
use crate::post::Post;

/// Turns one provider's network payload into post candidates.
///
/// Returns `None` when the expected top-level data path is missing (the
/// payload is ignored, not an error) and `Some` otherwise, possibly empty
/// after policy filtering. Individual malformed items are skipped inside.
pub type PayloadParser = fn(&Value) -> Option<Vec<Post>>;

/// Background listener on one page's network responses. Matching payloads
/// are parsed and pushed onto the channel as batches; a batch arriving is
/// the harvest loop's "data received" signal. Nothing in here ever raises
/// to the caller once attached.
pub struct Interceptor {
    task: JoinHandle<()>,
}

impl Interceptor {
    pub async fn attach(
        page: &Page,
        pattern: &str,
        parser: PayloadParser,
        batches: UnboundedSender<Vec<Post>>,
    ) -> Result<Self> {
        page.execute(EnableParams::default()).await.map_err(|e| {
            ScrapeError::BrowserError(format!("Failed to enable network events: {}", e))
        })?;
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| {
                ScrapeError::BrowserError(format!("Failed to subscribe to responses: {}", e))
            })?;

        let page = page.clone();
        let pattern = pattern.to_string();
        let task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if !route_matches(&event.response.url, &pattern) {
                    continue;
                }
                trace!("intercepted matching response: {}", event.response.url);

                let body = match page
                    .execute(GetResponseBodyParams::new(event.request_id.clone()))
                    .await
                {
                    Ok(body) => body,
                    Err(e) => {
                        // body may already be evicted; skip, don't crash
                        debug!("could not fetch response body: {}", e);
                        continue;
                    }
                };
                let raw = match decode_body(&body.result.body, body.result.base64_encoded) {
                    Some(raw) => raw,
                    None => {
                        debug!("response body was not decodable, skipping");
                        continue;
                    }
                };
                let payload: Value = match serde_json::from_slice(&raw) {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!("matching response was not JSON, skipping: {}", e);
                        continue;
                    }
                };

                if let Some(posts) = parser(&payload) {
                    debug!("payload yielded {} post candidates", posts.len());
                    // receiver gone means the harvest loop already finished
                    if batches.send(posts).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Self { task })
    }

    pub fn detach(self) {
        self.task.abort();
    }
}

fn decode_body(body: &str, base64_encoded: bool) -> Option<Vec<u8>> {
    if base64_encoded {
        BASE64.decode(body).ok()
    } else {
        Some(body.as_bytes().to_vec())
    }
}

/// Matches a URL against a route pattern where `*` spans any run of
/// characters, the same shape the provider endpoints are declared in.
pub fn route_matches(url: &str, pattern: &str) -> bool {
    let url = url.as_bytes();
    let pattern = pattern.as_bytes();
    let (mut u, mut p) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while u < url.len() {
        if p < pattern.len() && (pattern[p] == url[u]) {
            u += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            mark = u;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            u = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
