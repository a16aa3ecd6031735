//! Authenticated HTTP session with a SIGA-EDU portal.
//!
//! The portal is a JSF application: every page carries a
//! `javax.faces.ViewState` token that has to be sent back with the next
//! form submission, and the server keeps navigation state behind the
//! `JSESSIONID` cookie. [`Session`] owns both.

use crate::config::PortalConfig;
use crate::error::SigaError;
use crate::parse::{parse_login_error, parse_viewstate};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Path of the login page.
pub const LOGIN_PATH: &str = "/login.jsf";

const VIEWSTATE_FIELD: &str = "javax.faces.ViewState";
const SESSION_COOKIE: &str = "JSESSIONID";

/// Authentication state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No successful login yet (or the last attempt failed)
    Unauthenticated,
    /// Logged in, requests can be made
    Authenticated,
    /// The portal dropped the session; a new login is needed
    Expired,
}

/// A session key derived from the session cookie, safe to print in logs.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SessionKey(String);

impl SessionKey {
    /// Creates a session key from raw cookie data.
    ///
    /// The cookie value is hashed so the session token never ends up in logs.
    pub fn from_cookie(cookie_value: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(cookie_value.as_bytes());
        let result = hasher.finalize();
        Self(hex_encode(&result[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}...", &self.0[..8.min(self.0.len())])
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// HTTP session with the portal.
pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    viewstate: Option<String>,
    state: SessionState,
}

impl Session {
    /// Creates an unauthenticated session for the configured portal.
    pub fn new(config: &PortalConfig) -> Result<Self, SigaError> {
        let base_url = Url::parse(&config.base_url)?;
        let jar = Arc::new(Jar::default());

        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SigaError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            jar,
            base_url,
            viewstate: None,
            state: SessionState::Unauthenticated,
        })
    }

    /// Logs into the portal.
    ///
    /// Opens the login page first so the server creates a session and hands
    /// out a ViewState, then submits the login form. A 401/403 answer or an
    /// error box on the resulting page means the credentials were rejected;
    /// the session then stays unauthenticated.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), SigaError> {
        info!(user = %user, url = %self.base_url, "Logging into portal");

        self.viewstate = None;
        self.state = SessionState::Unauthenticated;

        self.submit(LOGIN_PATH, &[]).await?;

        let form = [
            ("formlogin", "formlogin"),
            ("formlogin:login", user),
            ("formlogin:senha", password),
            ("formlogin:botaologar", "Entrar"),
        ];
        let response = self.send_form(LOGIN_PATH, &form).await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let html = response.text().await.unwrap_or_default();
            let message = parse_login_error(&html)
                .unwrap_or_else(|| format!("login returned status {}", status));
            warn!(user = %user, status = %status, message = %message, "Portal refused login");
            return Err(SigaError::Authentication {
                user: user.to_string(),
                message,
            });
        }

        let html = self.read_page(LOGIN_PATH, response).await?;

        if let Some(message) = parse_login_error(&html) {
            warn!(user = %user, message = %message, "Portal rejected login");
            return Err(SigaError::Authentication {
                user: user.to_string(),
                message,
            });
        }

        self.state = SessionState::Authenticated;
        info!(user = %user, session = %self.key(), "Logged in");
        Ok(())
    }

    /// Submits a form to `page` within the authenticated session.
    ///
    /// Returns the response body. Fails without touching the network when
    /// the session is not authenticated.
    pub async fn post(&mut self, page: &str, form: &[(&str, &str)]) -> Result<String, SigaError> {
        match self.state {
            SessionState::Authenticated => {}
            SessionState::Unauthenticated => {
                return Err(SigaError::state("session is not logged in"));
            }
            SessionState::Expired => {
                return Err(SigaError::SessionExpired {
                    redirect_url: self.base_url().join(LOGIN_PATH)?.to_string(),
                });
            }
        }

        self.submit(page, form).await
    }

    /// Sends the form with the current ViewState and records the next one.
    async fn submit(&mut self, page: &str, form: &[(&str, &str)]) -> Result<String, SigaError> {
        let response = self.send_form(page, form).await?;
        self.read_page(page, response).await
    }

    /// Posts the form, failing if the portal dropped the session.
    async fn send_form(
        &mut self,
        page: &str,
        form: &[(&str, &str)],
    ) -> Result<Response, SigaError> {
        let url = self.base_url.join(page)?;

        let mut data = form.to_vec();
        if let Some(viewstate) = self.viewstate.as_deref() {
            data.push((VIEWSTATE_FIELD, viewstate));
        }

        debug!(page = %page, viewstate = ?self.viewstate, "Submitting form");

        let response = self.client.post(url).form(&data).send().await?;

        self.check_session_valid(&response, page)?;
        Ok(response)
    }

    /// Reads a successful page body and keeps its ViewState.
    async fn read_page(&mut self, page: &str, response: Response) -> Result<String, SigaError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SigaError::UnexpectedResponse {
                message: format!("{} returned status {}", page, status),
            });
        }

        let html = response.text().await?;
        self.viewstate = parse_viewstate(&html);
        debug!(page = %page, viewstate = ?self.viewstate, "Received page");

        Ok(html)
    }

    /// Marks the session as expired if the portal refused it.
    ///
    /// The portal signals a dead session either with 401/403 or by
    /// redirecting any page back to the login form. Responses of the login
    /// page itself are left to [`Session::login`].
    fn check_session_valid(&mut self, response: &Response, page: &str) -> Result<(), SigaError> {
        if page == LOGIN_PATH {
            return Ok(());
        }

        let final_url = response.url();
        let refused = matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        );
        let bounced = final_url.path().ends_with(LOGIN_PATH);

        if refused || bounced {
            warn!(
                session = %self.key(),
                page = %page,
                url = %final_url,
                status = %response.status(),
                "Session expired"
            );
            self.state = SessionState::Expired;
            self.viewstate = None;
            return Err(SigaError::SessionExpired {
                redirect_url: final_url.to_string(),
            });
        }

        Ok(())
    }

    /// Current `JSESSIONID` cookie value, if the portal set one.
    pub fn session_id(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let cookies = header.to_str().ok()?;
        cookies
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value.to_string())
    }

    /// Loggable key of the current session.
    pub fn key(&self) -> SessionKey {
        SessionKey::from_cookie(&self.session_id().unwrap_or_default())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn viewstate(&self) -> Option<&str> {
        self.viewstate.as_deref()
    }
}
