use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::session::SessionStore;

/// Fixed client identity applied to every page. The point is a normalized
/// fingerprint that stays identical across runs, not a randomized one.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/109.0";
pub const ACCEPT_LANGUAGE: &str = "es-ES";
const PLATFORM: &str = "Win32";

/// One browser process plus its CDP handler task, scoped to a single login
/// gate run or a single scrape call. Must be closed on every exit path.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    provider: String,
    sessions: SessionStore,
}

impl BrowserSession {
    /// Launches the browser. Launch failures propagate without retry; any
    /// partially opened resource is torn down by dropping the config.
    pub async fn launch(headless: bool, provider: &str, sessions: SessionStore) -> Result<Self> {
        info!("launching browser for provider {} (headless: {})", provider, headless);

        let user_data_dir =
            std::env::temp_dir().join(format!("feed-harvester-{}", std::process::id()));

        let mut config = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&user_data_dir)
            .args(vec![
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--no-first-run",
                "--disable-default-apps",
                "--disable-sync",
                "--mute-audio",
                "--disable-blink-features=AutomationControlled",
            ]);
        if !headless {
            config = config.with_head();
        }
        let config = config.build().map_err(|e| {
            ScrapeError::BrowserError(format!("Failed to create browser config: {}", e))
        })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            ScrapeError::BrowserError(format!("Failed to launch browser: {}", e))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    // filter out common websocket deserialization noise
                    let msg = e.to_string();
                    if msg.contains("data did not match any variant")
                        || msg.contains("untagged enum Message")
                    {
                        debug!("ignoring WebSocket deserialization error: {}", e);
                    } else {
                        warn!("browser handler error: {}", e);
                    }
                }
            }
            debug!("browser handler task ended");
        });

        Ok(Self {
            browser,
            handler_task,
            provider: provider.to_string(),
            sessions,
        })
    }

    /// Opens a page with the normalized identity applied and any persisted
    /// session state for this provider restored. A missing or unreadable
    /// session blob simply yields a fresh unauthenticated context.
    pub async fn new_page(&self) -> Result<Page> {
        let page = self.browser.new_page("about:blank").await.map_err(|e| {
            ScrapeError::BrowserError(format!("Failed to create new page: {}", e))
        })?;

        let identity = SetUserAgentOverrideParams::builder()
            .user_agent(USER_AGENT)
            .accept_language(ACCEPT_LANGUAGE)
            .platform(PLATFORM)
            .build()
            .map_err(|e| {
                ScrapeError::BrowserError(format!("Failed to build user agent params: {}", e))
            })?;
        page.execute(identity).await.map_err(|e| {
            ScrapeError::BrowserError(format!("Failed to set user agent: {}", e))
        })?;

        if let Some(blob) = self.sessions.load(&self.provider)? {
            let cookies = decode_session_blob(&blob);
            if cookies.is_empty() {
                debug!("persisted session for {} held no usable cookies", self.provider);
            } else {
                let params: Vec<CookieParam> =
                    cookies.into_iter().map(cookie_param).collect::<Result<_>>()?;
                page.set_cookies(params).await.map_err(|e| {
                    ScrapeError::BrowserError(format!("Failed to restore cookies: {}", e))
                })?;
                debug!("restored persisted session for {}", self.provider);
            }
        }

        Ok(page)
    }

    /// Serializes the page's current cookies into an opaque blob suitable
    /// for the session store.
    pub async fn capture_state(&self, page: &Page) -> Result<String> {
        let cookies = page.get_cookies().await.map_err(|e| {
            ScrapeError::BrowserError(format!("Failed to read cookies: {}", e))
        })?;
        let stored: Vec<StoredCookie> = cookies.iter().map(stored_cookie).collect();
        let blob = serde_json::to_string(&stored)
            .map_err(|e| ScrapeError::ParseError(e.to_string()))?;
        Ok(blob)
    }

    /// Closes the browser exactly once. When `destroy_session` is set the
    /// persisted state for this provider is removed as well.
    pub async fn close(mut self, destroy_session: bool) -> Result<()> {
        info!("closing browser session for {}", self.provider);
        let closed = self.browser.close().await;
        self.handler_task.abort();
        if destroy_session {
            self.sessions.invalidate(&self.provider)?;
        }
        closed.map_err(|e| ScrapeError::BrowserError(format!("Failed to close browser: {}", e)))?;
        Ok(())
    }
}

/// Polls for a CSS selector until it resolves or the timeout elapses.
pub async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ScrapeError::NavigationError(format!(
                "element {} never appeared",
                selector
            ))
            .into());
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// Cookie shape we persist. Kept separate from the CDP types so the blob
/// format stays stable across chromiumoxide upgrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    http_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    same_site: Option<String>,
}

fn stored_cookie(cookie: &Cookie) -> StoredCookie {
    StoredCookie {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        secure: cookie.secure,
        http_only: cookie.http_only,
        // session cookies carry a placeholder expiry we must not persist
        expires: if cookie.session { None } else { Some(cookie.expires) },
        same_site: cookie.same_site.as_ref().map(|s| {
            match s {
                CookieSameSite::Strict => "Strict",
                CookieSameSite::Lax => "Lax",
                CookieSameSite::None => "None",
            }
            .to_string()
        }),
    }
}

fn cookie_param(cookie: StoredCookie) -> Result<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(cookie.name)
        .value(cookie.value)
        .domain(cookie.domain)
        .path(cookie.path)
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    if let Some(same_site) = cookie.same_site.as_deref() {
        builder = match same_site {
            "Strict" => builder.same_site(CookieSameSite::Strict),
            "Lax" => builder.same_site(CookieSameSite::Lax),
            "None" => builder.same_site(CookieSameSite::None),
            _ => builder,
        };
    }
    builder
        .build()
        .map_err(|e| ScrapeError::BrowserError(format!("Failed to build cookie: {}", e)).into())
}

fn decode_session_blob(blob: &str) -> Vec<StoredCookie> {
    // unreadable state is treated as absent, never as an error
    serde_json::from_str(blob).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_blob_decodes_to_no_cookies() {
        assert!(decode_session_blob("not json at all").is_empty());
        assert!(decode_session_blob("{\"wrong\":\"shape\"}").is_empty());
        assert!(decode_session_blob("").is_empty());
    }

    #[test]
    fn test_blob_roundtrip() {
        let stored = vec![StoredCookie {
            name: "sessionid".into(),
            value: "abc123".into(),
            domain: ".example.com".into(),
            path: "/".into(),
            secure: true,
            http_only: true,
            expires: Some(1700000000.0),
            same_site: Some("Lax".into()),
        }];
        let blob = serde_json::to_string(&stored).unwrap();
        let decoded = decode_session_blob(&blob);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, "sessionid");
        assert_eq!(decoded[0].same_site.as_deref(), Some("Lax"));
    }

    #[test]
    fn test_cookie_param_mapping() {
        let stored = StoredCookie {
            name: "auth".into(),
            value: "token".into(),
            domain: ".x.com".into(),
            path: "/".into(),
            secure: true,
            http_only: false,
            expires: None,
            same_site: Some("None".into()),
        };
        let param = cookie_param(stored).unwrap();
        assert_eq!(param.name, "auth");
        assert_eq!(param.domain.as_deref(), Some(".x.com"));
        assert!(param.expires.is_none());
    }
}
