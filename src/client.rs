//! HTTP client for the puzzle site
//!
//! Three endpoints, all authenticated with the session cookie: the puzzle
//! input, the problem page and the answer form.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use std::time::Duration;

use crate::config::SiteConfig;
use crate::html;
use crate::session::SessionCookie;

pub struct PuzzleClient {
    http: reqwest::Client,
    base_url: String,
}

impl PuzzleClient {
    pub fn new(session: &SessionCookie, site: &SiteConfig) -> Result<Self> {
        let mut cookie = HeaderValue::from_str(&session.header())
            .context("Session cookie is not a valid header value")?;
        cookie.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);

        let http = reqwest::Client::builder()
            .user_agent(site.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(site.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: site.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Site-relative path of a day's page, e.g. `/2023/day/5`
    pub fn day_path(year: i32, day: u8) -> String {
        format!("/{}/day/{}", year, day)
    }

    pub fn day_url(&self, year: i32, day: u8) -> String {
        format!("{}{}", self.base_url, Self::day_path(year, day))
    }

    /// Fetches the raw puzzle input
    pub async fn fetch_input(&self, year: i32, day: u8) -> Result<String> {
        let url = format!("{}/input", self.day_url(year, day));
        self.send(self.http.get(&url), &url).await
    }

    /// Fetches the problem page and returns its main region as text
    pub async fn fetch_problem(&self, year: i32, day: u8) -> Result<String> {
        let url = self.day_url(year, day);
        let body = self.send(self.http.get(&url), &url).await?;
        html::main_text(&body, None)
            .with_context(|| format!("Unexpected problem page from {}", url))
    }

    /// Submits an answer for one part and returns the site's verdict as text
    pub async fn submit_answer(
        &self,
        year: i32,
        day: u8,
        answer: &str,
        level: u8,
    ) -> Result<String> {
        let url = format!("{}/answer", self.day_url(year, day));
        let level = level.to_string();
        let request = self
            .http
            .post(&url)
            .form(&[("answer", answer), ("level", level.as_str())]);
        let body = self.send(request, &url).await?;

        // The verdict links back to the day page; that link is noise here.
        html::main_text(&body, Some(&Self::day_path(year, day)))
            .with_context(|| format!("Unexpected answer page from {}", url))
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String> {
        tracing::info!(%url, "requesting");
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to connect to {} (check network connection)", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let hint = match status.as_u16() {
                400 | 401 => " (is the session cookie still valid?)",
                404 => " (is the puzzle unlocked yet?)",
                500..=599 => " (site error, try again later)",
                _ => "",
            };
            bail!("{} returned {}{}", url, status, hint);
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))
    }
}
