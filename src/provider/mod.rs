use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::browser::{self, BrowserSession};
use crate::error::{Result, ScrapeError};
use crate::export::ScrapeResult;
use crate::harvest::{self, HarvestOptions};
use crate::interceptor::{Interceptor, PayloadParser};
use crate::login::{ConfirmLogin, LoginGate};
use crate::post::PostStore;
use crate::session::SessionStore;

pub mod instagram;
pub mod x;

const READY_SELECTOR_TIMEOUT: Duration = Duration::from_secs(15);

/// Everything that distinguishes one feed source from another: the URLs,
/// the intercepted route, and the payload parser (which owns the field
/// path, the media rule and the reshare predicate). Adding a provider
/// means supplying these facts, not new loop or session logic.
#[derive(Clone)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub base_url: &'static str,
    pub login_url: &'static str,
    pub requires_login: bool,
    pub route_pattern: &'static str,
    /// Element that marks the profile page as usable, when the provider
    /// has a reliable one.
    pub ready_selector: Option<&'static str>,
    /// Settle delay after navigation before the first scroll.
    pub settle: Duration,
    pub parser: PayloadParser,
}

pub fn known_providers() -> Vec<&'static str> {
    vec![instagram::spec().name, x::spec().name]
}

pub fn spec_by_name(name: &str) -> Option<ProviderSpec> {
    match name {
        "instagram" => Some(instagram::spec()),
        "x" => Some(x::spec()),
        _ => None,
    }
}

/// A concrete feed source: spec plus session persistence. Owns the full
/// scrape flow — browser session, interception, harvest loop, export
/// payload — per the single-flow model (one browser per call, released on
/// every exit path).
pub struct FeedProvider {
    spec: ProviderSpec,
    sessions: SessionStore,
}

impl FeedProvider {
    pub fn new(spec: ProviderSpec, sessions: SessionStore) -> Self {
        Self { spec, sessions }
    }

    pub fn by_name(name: &str, sessions: SessionStore) -> Option<Self> {
        spec_by_name(name).map(|spec| Self::new(spec, sessions))
    }

    pub fn name(&self) -> &str {
        self.spec.name
    }

    pub fn requires_login(&self) -> bool {
        self.spec.requires_login
    }

    /// Runs the manual-login gate. `Ok(false)` means the operator denied;
    /// the caller decides whether to abort.
    pub async fn login(&self, confirmer: &dyn ConfirmLogin) -> Result<bool> {
        let gate = LoginGate::new(self.spec.name, self.spec.login_url, self.sessions.clone());
        gate.run(confirmer).await
    }

    /// Harvests up to `limit` posts from the user's profile feed. Fewer
    /// posts than requested is a successful outcome (feeds under-deliver);
    /// the list is deduplicated and in first-seen order.
    pub async fn scrape(&self, limit: usize, user: &str, headless: bool) -> Result<ScrapeResult> {
        validate_args(limit, user)?;

        let session =
            BrowserSession::launch(headless, self.spec.name, self.sessions.clone()).await?;
        let outcome = self.harvest_profile(&session, limit, user).await;
        // the session after a scrape is considered spent, like the login
        // cookies it was seeded from
        if let Err(e) = session.close(true).await {
            warn!("failed to close browser session: {}", e);
        }

        let store = outcome?;
        info!(
            "scraped {} posts from {}/{}",
            store.len(),
            self.spec.base_url,
            user
        );
        Ok(ScrapeResult {
            provider: self.spec.name.to_string(),
            date: Utc::now(),
            posts: store.into_posts(),
        })
    }

    async fn harvest_profile(
        &self,
        session: &BrowserSession,
        limit: usize,
        user: &str,
    ) -> Result<PostStore> {
        let page = session.new_page().await?;

        let (batches_tx, mut batches_rx) = mpsc::unbounded_channel();
        let interceptor =
            Interceptor::attach(&page, self.spec.route_pattern, self.spec.parser, batches_tx)
                .await?;

        let url = format!("{}/{}", self.spec.base_url, user);
        page.goto(url.as_str()).await.map_err(|e| {
            ScrapeError::NavigationError(format!("Failed to load {}: {}", url, e))
        })?;
        if let Some(selector) = self.spec.ready_selector {
            browser::wait_for_selector(&page, selector, READY_SELECTOR_TIMEOUT).await?;
        }

        let mut store = PostStore::new();
        let opts = HarvestOptions {
            settle: self.spec.settle,
            ..HarvestOptions::default()
        };
        let state = harvest::run(&page, &mut batches_rx, &mut store, limit, &opts).await;
        interceptor.detach();
        let state = state?;

        info!("harvest loop finished in state {:?}", state);
        Ok(store)
    }
}

/// Both checks run before any browser action is taken.
fn validate_args(limit: usize, user: &str) -> Result<()> {
    if limit == 0 {
        return Err(ScrapeError::ConfigError(
            "limit must be a positive number of posts".to_string(),
        )
        .into());
    }
    if user.trim().is_empty() {
        return Err(ScrapeError::ConfigError("user must not be empty".to_string()).into());
    }
    Ok(())
}
