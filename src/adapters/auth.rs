use crate::domain::ports::Authenticator;
use crate::utils::error::{EnvError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const SHOWDOWN_ACTION_URL: &str = "https://play.pokemonshowdown.com/action.php";

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    actionsuccess: bool,
    #[serde(default)]
    assertion: String,
}

/// Login server responses are JSON prefixed with a single `]`.
fn parse_action_response(body: &str) -> Result<ActionResponse> {
    let json = body
        .strip_prefix(']')
        .ok_or_else(|| EnvError::auth("unexpected login server response"))?;
    Ok(serde_json::from_str(json)?)
}

/// Talks to Showdown's `action.php`.
#[derive(Debug, Clone)]
pub struct ShowdownAuthenticator {
    client: Client,
    action_url: String,
}

impl ShowdownAuthenticator {
    pub fn new(action_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            action_url: action_url.into(),
        }
    }

    async fn post(&self, form: &[(&str, &str)]) -> Result<String> {
        tracing::debug!("POST {} act={}", self.action_url, form[0].1);
        let response = self.client.post(&self.action_url).form(form).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}

impl Default for ShowdownAuthenticator {
    fn default() -> Self {
        Self::new(SHOWDOWN_ACTION_URL)
    }
}

#[async_trait]
impl Authenticator for ShowdownAuthenticator {
    async fn register(&self, challstr: &str, username: &str, password: &str) -> Result<String> {
        let body = self
            .post(&[
                ("act", "register"),
                ("captcha", "pikachu"),
                ("challstr", challstr),
                ("cpassword", password),
                ("password", password),
                ("username", username),
            ])
            .await?;

        let response = parse_action_response(&body)
            .map_err(|_| EnvError::auth("invalid username and/or password"))?;
        if !response.actionsuccess {
            return Err(EnvError::auth("invalid username and/or password"));
        }
        tracing::info!("Registered new account {}", username);
        Ok(response.assertion)
    }

    async fn login(&self, challstr: &str, username: &str, password: &str) -> Result<String> {
        let body = self
            .post(&[
                ("act", "login"),
                ("name", username),
                ("pass", password),
                ("challstr", challstr),
            ])
            .await?;

        let response = parse_action_response(&body)?;
        if response.assertion.is_empty() || response.assertion.starts_with(";;") {
            return Err(EnvError::auth(format!("login rejected for {}", username)));
        }
        Ok(response.assertion)
    }

    async fn guest(&self, challstr: &str, username: &str) -> Result<String> {
        let body = self
            .post(&[
                ("act", "getassertion"),
                ("challstr", challstr),
                ("userid", username),
            ])
            .await?;

        let assertion = body.trim();
        // ";;" 開頭代表伺服器拒絕（名稱已註冊或被封鎖）
        if assertion.is_empty() || assertion.starts_with(";;") {
            return Err(EnvError::auth(format!(
                "no assertion for guest {}: {}",
                username,
                assertion.trim_start_matches(";;")
            )));
        }
        Ok(assertion.to_string())
    }
}

/// How the simulator obtains an identity on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Unregistered random name.
    Guest,
    /// Register a fresh random account.
    Register,
    /// Log in with the username/password stored in a file.
    File(PathBuf),
}

impl AuthMode {
    /// `""`/`"guest"` → guest, `"register"` → register, anything else is a credentials path.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "guest" => AuthMode::Guest,
            "register" => AuthMode::Register,
            path => AuthMode::File(PathBuf::from(path)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Username on the first line, password on the second.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        match (lines.next(), lines.next()) {
            (Some(username), Some(password)) => Ok(Self {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(EnvError::auth(format!(
                "{} must contain a username line and a password line",
                path.as_ref().display()
            ))),
        }
    }
}
