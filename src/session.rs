//! Authenticated session client for the registry's ria web service.
//!
//! The registry issues a short-lived session key from a handshake
//! endpoint; every later call presents that key as a basic-auth
//! credential. The client moves through `Closed → Authenticating → Open
//! → Closed`: [`SessionClient::open`] performs the handshake (retrying a
//! bounded number of times on bad credentials, invalidating the stored
//! password in between), [`SessionClient::search`] and
//! [`SessionClient::update`] carry the key, and
//! [`SessionClient::close`] releases the key server-side. Close is safe
//! to call without a prior open and must run on every exit path of an
//! operation that opened the session.
//!
//! Passwords are resolved in order: the `AREC_PASSWORD` environment
//! variable, the platform keyring, then an interactive prompt (which
//! persists the answer to the keyring).

use anyhow::{bail, Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::time::Duration;

/// Failed handshakes are retried this many times after the first attempt,
/// invalidating the stored credential before each retry.
const MAX_AUTH_RETRIES: u32 = 3;

const SESSION_PATH: &str = "/ria-ws/application/session";

pub struct SessionClient {
    server: String,
    username: String,
    http: reqwest::Client,
    key: Option<String>,
}

impl SessionClient {
    pub fn new(server: &str, username: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            username: username.to_string(),
            http,
            key: None,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_open(&self) -> bool {
        self.key.is_some()
    }

    /// Perform the authentication handshake and store the session key.
    ///
    /// A non-success status invalidates the stored password and retries,
    /// up to [`MAX_AUTH_RETRIES`] times; exhaustion is fatal for the
    /// whole run. A success response without a key element is fatal
    /// immediately — the server answered, the credential was fine, and
    /// retrying cannot help.
    pub async fn open(&mut self) -> Result<()> {
        let url = format!("{}{}", self.server, SESSION_PATH);
        let mut attempt = 0;
        loop {
            let password = self.password()?;
            let response = self
                .http
                .get(&url)
                .basic_auth(
                    format!("user[{}]", self.username),
                    Some(format!("password[{password}]")),
                )
                .header(CONTENT_TYPE, "application/xml")
                .send()
                .await
                .with_context(|| format!("session handshake against {url} failed"))?;
            if response.status().is_success() {
                let body = response.text().await?;
                match xml::first_text(&body, "key")? {
                    Some(key) => {
                        self.key = Some(key);
                        return Ok(());
                    }
                    None => bail!("no session key in handshake response"),
                }
            }
            if attempt >= MAX_AUTH_RETRIES {
                bail!(
                    "authentication for {} on {} failed after {} attempts",
                    self.username,
                    self.server,
                    attempt + 1
                );
            }
            attempt += 1;
            self.forget_password();
            println!(
                "Wrong password for {} on {}, attempt {}",
                self.username, self.server, attempt
            );
        }
    }

    /// Issue a structured search request. Non-2xx is fatal for this call
    /// and propagated; this layer never retries.
    pub async fn search(&self, path: &str, body: String) -> Result<String> {
        self.request(Method::POST, path, body).await
    }

    /// Issue a structured mutation request, same contract as
    /// [`search`](SessionClient::search).
    pub async fn update(&self, path: &str, body: String) -> Result<String> {
        self.request(Method::PUT, path, body).await
    }

    async fn request(&self, method: Method, path: &str, body: String) -> Result<String> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("session not open"))?;
        let url = format!("{}{}", self.server, path);
        let response = self
            .http
            .request(method, &url)
            .basic_auth(
                format!("user[{}]", self.username),
                Some(format!("session[{key}]")),
            )
            .header(CONTENT_TYPE, "application/xml; charset=UTF-8")
            .body(body)
            .send()
            .await
            .with_context(|| format!("registry request {path} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("registry request {path} returned status {status}");
        }
        Ok(response.text().await?)
    }

    /// Release the session key server-side, if one is held.
    ///
    /// Without a prior successful open this is a no-op and never fails.
    /// The release itself is best-effort: the server expires keys on its
    /// own, so a failed delete is reported but the client still ends up
    /// closed.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(key) = self.key.take() {
            let url = format!("{}{}/{}", self.server, SESSION_PATH, key);
            self.http
                .delete(&url)
                .basic_auth(
                    format!("user[{}]", self.username),
                    Some(format!("session[{key}]")),
                )
                .send()
                .await
                .context("failed to release session key")?;
        }
        Ok(())
    }

    fn password(&self) -> Result<String> {
        if let Ok(password) = std::env::var("AREC_PASSWORD") {
            return Ok(password);
        }
        if let Ok(entry) = keyring::Entry::new(&self.server, &self.username) {
            if let Ok(password) = entry.get_password() {
                return Ok(password);
            }
        }
        let password = rpassword::prompt_password(format!(
            "Password for {} on {}: ",
            self.username, self.server
        ))
        .context("failed to read password")?;
        if let Ok(entry) = keyring::Entry::new(&self.server, &self.username) {
            let _ = entry.set_password(&password);
        }
        Ok(password)
    }

    fn forget_password(&self) {
        if let Ok(entry) = keyring::Entry::new(&self.server, &self.username) {
            let _ = entry.delete_credential();
        }
    }
}

/// Namespace-agnostic helpers for the registry's tag/attribute trees.
///
/// The registry namespaces every module differently, so matching happens
/// on local names only.
pub mod xml {
    use anyhow::Result;
    use quick_xml::events::Event;
    use quick_xml::Reader;

    /// Text content of the first element with the given local name.
    pub fn first_text(body: &str, local: &str) -> Result<Option<String>> {
        let mut reader = Reader::from_str(body);
        loop {
            match reader.read_event()? {
                Event::Start(start) if start.local_name().as_ref() == local.as_bytes() => {
                    if let Event::Text(text) = reader.read_event()? {
                        return Ok(Some(text.unescape()?.into_owned()));
                    }
                    return Ok(None);
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    /// Attribute value on the first element with the given local name
    /// that carries the attribute.
    pub fn first_attr(body: &str, local: &str, attr: &str) -> Result<Option<String>> {
        let mut reader = Reader::from_str(body);
        loop {
            let element = match reader.read_event()? {
                Event::Start(start) if start.local_name().as_ref() == local.as_bytes() => start,
                Event::Empty(start) if start.local_name().as_ref() == local.as_bytes() => start,
                Event::Eof => return Ok(None),
                _ => continue,
            };
            for attribute in element.attributes() {
                let attribute = attribute?;
                if attribute.key.local_name().as_ref() == attr.as_bytes() {
                    return Ok(Some(attribute.unescape_value()?.into_owned()));
                }
            }
        }
    }
}
