use std::io::{self, BufRead, Write};
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::error::{Result, ScrapeError};
use crate::session::SessionStore;

/// Operator confirmation channel. One synchronous yes/no question asked
/// after the human has had a chance to log in by hand. The wait is
/// unbounded on purpose; nothing else runs until the operator answers.
pub trait ConfirmLogin {
    fn confirm(&self) -> bool;
}

/// Terminal y/n prompt, the production confirmation channel.
pub struct TerminalConfirm;

impl ConfirmLogin for TerminalConfirm {
    fn confirm(&self) -> bool {
        print!("Have you logged in to the provider page? [y/N] ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Drives the manual-login flow: headful browser, navigate to the login
/// page, suspend on the operator's answer, and persist the session state
/// only when the answer is affirmative. Never retries.
pub struct LoginGate {
    provider: String,
    login_url: String,
    sessions: SessionStore,
}

impl LoginGate {
    pub fn new(provider: impl Into<String>, login_url: impl Into<String>, sessions: SessionStore) -> Self {
        Self {
            provider: provider.into(),
            login_url: login_url.into(),
            sessions,
        }
    }

    /// Returns `Ok(true)` when the operator confirmed and the session was
    /// persisted, `Ok(false)` on denial. The browser is released on every
    /// path, including errors.
    pub async fn run(&self, confirmer: &dyn ConfirmLogin) -> Result<bool> {
        let session = BrowserSession::launch(false, &self.provider, self.sessions.clone()).await?;
        let captured = self.await_operator(&session, confirmer).await;
        match captured {
            Ok(state) => {
                let verdict = persist_if_confirmed(&self.sessions, &self.provider, state);
                if let Err(e) = session.close(false).await {
                    warn!("failed to close login browser: {}", e);
                }
                verdict
            }
            Err(e) => {
                if let Err(close_err) = session.close(false).await {
                    warn!("failed to close login browser: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Navigates to the login page and blocks on the confirmation channel.
    /// Returns the captured session state on an affirmative answer.
    async fn await_operator(
        &self,
        session: &BrowserSession,
        confirmer: &dyn ConfirmLogin,
    ) -> Result<Option<String>> {
        let page = session.new_page().await?;
        page.goto(self.login_url.as_str()).await.map_err(|e| {
            ScrapeError::NavigationError(format!(
                "Failed to load login page {}: {}",
                self.login_url, e
            ))
        })?;
        info!("waiting for operator to finish logging in at {}", self.login_url);

        if !confirmer.confirm() {
            return Ok(None);
        }
        let state = session.capture_state(&page).await?;
        Ok(Some(state))
    }
}

/// Session state is persisted if and only if the login was confirmed. A
/// denial leaves any previously persisted state untouched.
fn persist_if_confirmed(
    sessions: &SessionStore,
    provider: &str,
    captured: Option<String>,
) -> Result<bool> {
    match captured {
        Some(blob) => {
            sessions.save(provider, &blob)?;
            info!("login confirmed, session persisted for {}", provider);
            Ok(true)
        }
        None => {
            warn!("login not confirmed for {}, nothing persisted", provider);
            Ok(false)
        }
    }
}
