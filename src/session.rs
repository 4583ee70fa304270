use anyhow::{anyhow, bail, Context, Result};
use std::fmt;

use crate::config::{Browser, Config};

/// Name of the puzzle site's authentication cookie
const COOKIE_NAME: &str = "session";

/// The puzzle site's session credential, resolved once per invocation
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie(String);

impl SessionCookie {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    /// Value for a `Cookie` request header
    pub fn header(&self) -> String {
        format!("{}={}", COOKIE_NAME, self.0)
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCookie(..)")
    }
}

/// Resolves the session cookie: the configured environment variable wins,
/// otherwise the browser's cookie store is read for the site's domain.
pub fn resolve(config: &Config) -> Result<SessionCookie> {
    let domain = site_domain(&config.site.base_url)?;
    let browser = config.session.browser;
    resolve_from(
        std::env::var(&config.session.env_var).ok(),
        || browser_cookie(browser, &domain),
    )
    .with_context(|| {
        format!(
            "Set {} or log in to {} with {:?}",
            config.session.env_var, domain, browser
        )
    })
}

fn resolve_from(
    env_value: Option<String>,
    from_browser: impl FnOnce() -> Result<Option<String>>,
) -> Result<SessionCookie> {
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        tracing::debug!("using session cookie from environment");
        return Ok(SessionCookie::new(value));
    }

    match from_browser()? {
        Some(value) => {
            tracing::debug!("using session cookie from browser store");
            Ok(SessionCookie::new(value))
        }
        None => bail!("No session cookie found"),
    }
}

fn site_domain(base_url: &str) -> Result<String> {
    let url = reqwest::Url::parse(base_url)
        .with_context(|| format!("Invalid site URL: {}", base_url))?;
    url.host_str()
        .map(str::to_string)
        .with_context(|| format!("Site URL has no host: {}", base_url))
}

fn browser_cookie(browser: Browser, domain: &str) -> Result<Option<String>> {
    let domains = Some(vec![domain.to_string()]);
    let cookies = match browser {
        Browser::Firefox => rookie::firefox(domains),
        Browser::Chrome => rookie::chrome(domains),
        Browser::Chromium => rookie::chromium(domains),
        Browser::Edge => rookie::edge(domains),
        Browser::Brave => rookie::brave(domains),
        Browser::Any => rookie::load(domains),
    }
    .map_err(|e| anyhow!("Failed to read {:?} cookies: {}", browser, e))?;

    Ok(cookies
        .into_iter()
        .find(|c| c.name == COOKIE_NAME)
        .map(|c| c.value))
}
