//! Escalation of unparseable input to an external natural-language resolver.
//!
//! The resolver is a boundary call: it does no local parsing of the user's
//! text and is assumed slow and untrusted. Every failure mode (transport
//! error, non-2xx status, malformed body, unusable range) becomes a
//! `Failed` outcome instead of an error.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::FallbackConfig;
use crate::error::{RangeError, Result};
use crate::format::{describe_time_range, parse_display_zone, DisplayZone, FormatOptions};
use crate::range::{FailureReason, ParseOutcome, ResolutionSource, TimeRange};

#[async_trait]
pub trait FallbackResolver: Send + Sync + fmt::Debug {
    /// Resolve `raw_input` relative to `now`.
    ///
    /// Implementations report failure as [`ParseOutcome::Failed`]; they do
    /// not return errors or panic.
    async fn resolve(&self, raw_input: &str, now: DateTime<Utc>) -> ParseOutcome;
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
    input: &'a str,
    now: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<&'a str>,
}

#[derive(Deserialize)]
struct ResolveResponse {
    #[serde(alias = "from")]
    start: String,
    #[serde(alias = "to")]
    end: String,
    #[serde(default)]
    label: Option<String>,
}

/// Resolver that POSTs `{input, now}` to a JSON endpoint.
#[derive(Debug)]
pub struct HttpFallbackResolver {
    client: reqwest::Client,
    api_url: String,
    timezone: Option<String>,
    zone: DisplayZone,
}

impl HttpFallbackResolver {
    /// Build a resolver for `config`.
    ///
    /// `timezone` is forwarded to the service and used to read timestamps
    /// that come back without an offset.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidConfig`] for unusable header names or
    /// values, [`RangeError::InvalidTimezone`] for an unknown zone, and
    /// [`RangeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &FallbackConfig, timezone: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.auth_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RangeError::InvalidConfig(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RangeError::InvalidConfig(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let zone = match timezone {
            Some(tz) => parse_display_zone(tz)?,
            None => DisplayZone::Fixed(Utc.fix()),
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        tracing::debug!(
            api_url = %config.api_url,
            timeout_ms = config.timeout_ms,
            "Fallback resolver initialized"
        );
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            timezone: timezone.map(str::to_string),
            zone,
        })
    }

    async fn request(&self, raw_input: &str, now: DateTime<Utc>) -> Result<ParseOutcome> {
        let payload = ResolveRequest {
            input: raw_input,
            now: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            timezone: self.timezone.as_deref(),
        };
        let resp = self.client.post(&self.api_url).json(&payload).send().await?;

        if !resp.status().is_success() {
            return Err(RangeError::FallbackUnavailable(format!(
                "POST {} returned {}",
                self.api_url,
                resp.status()
            )));
        }

        let text = resp.text().await?;
        let body: ResolveResponse = serde_json::from_str(&text)
            .map_err(|e| RangeError::FallbackUnavailable(format!("malformed response: {e}")))?;

        let start = self.read_timestamp(&body.start)?;
        let end = self.read_timestamp(&body.end)?;
        let range = TimeRange::new(start, end);
        if range.is_point() {
            return Err(RangeError::FallbackUnavailable(
                "service returned a zero-width range".to_string(),
            ));
        }

        let interpretation = match body.label.map(|l| l.trim().to_string()) {
            Some(label) if !label.is_empty() => label,
            _ => describe_time_range(
                &range,
                now,
                &FormatOptions {
                    timezone: self.timezone.clone(),
                },
            ),
        };
        Ok(ParseOutcome::resolved(
            range,
            interpretation,
            ResolutionSource::Fallback,
        ))
    }

    /// Read an RFC 3339 instant, or a naive timestamp/date in the display zone.
    fn read_timestamp(&self, s: &str) -> Result<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            });
        naive
            .and_then(|naive| self.zone.localize(naive))
            .ok_or_else(|| RangeError::FallbackUnavailable(format!("unreadable timestamp '{s}'")))
    }
}

#[async_trait]
impl FallbackResolver for HttpFallbackResolver {
    async fn resolve(&self, raw_input: &str, now: DateTime<Utc>) -> ParseOutcome {
        match self.request(raw_input, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(input = raw_input, error = %e, "Fallback resolution failed");
                ParseOutcome::failed(FailureReason::from(&e))
            }
        }
    }
}
