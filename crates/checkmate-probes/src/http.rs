//! HTTP health checks
//!
//! Sends one request per attempt and passes when the status code matches the
//! configured pattern and, if a JSONPath template is set, the rendered value
//! matches a regex.

use std::collections::BTreeMap;
use std::time::Duration;

use checkmate_core::retry::{Attempt, RetryWindow, TracingObserver, Verdict};
use checkmate_core::{Diagnostics, RetryPolicy, RetryResult};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Certificate, Client, Method, Url};
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{CheckError, Result};
use crate::jsonpath::JsonPathTemplate;
use crate::outcome::{conclude, record_fatal};
use crate::status::StatusPattern;

fn default_method() -> String {
    "GET".to_string()
}

fn default_status_code() -> String {
    "200".to_string()
}

/// Accept `status_code: 200` as well as `status_code: "200-299"`
fn deserialize_status_code<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Pattern(String),
        Code(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Pattern(pattern) => pattern,
        Raw::Code(code) => code.to_string(),
    })
}

fn default_request_timeout() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    5000
}

fn default_interval() -> u64 {
    200
}

fn default_consecutive_successes() -> u32 {
    1
}

/// Configuration for an HTTP health check
///
/// Durations are in milliseconds. Empty strings mean "not set".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCheckSpec {
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub request_body: String,

    /// Status code pattern, e.g. `200-204,300`
    #[serde(
        default = "default_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status_code: String,

    /// Timeout for a single request; 0 leaves requests bounded only by
    /// `timeout`
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// PEM encoded CA certificates to trust in addition to the system roots
    #[serde(default)]
    pub ca_bundle: String,

    /// Skip certificate verification
    #[serde(default)]
    pub insecure_tls: bool,

    /// kubectl-style JSONPath template applied to the response body
    #[serde(default)]
    pub jsonpath: String,

    /// Regex the rendered JSONPath value must match
    #[serde(default)]
    pub json_value: String,

    /// Overall timeout for the whole check
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default = "default_consecutive_successes")]
    pub consecutive_successes: u32,

    #[serde(default)]
    pub create_anyway_on_check_failure: bool,
}

impl HttpCheckSpec {
    /// Create a spec for `url` with every other field at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> checkmate_core::Result<RetryPolicy> {
        RetryPolicy::from_millis(self.timeout, self.interval, self.consecutive_successes)
    }
}

impl Default for HttpCheckSpec {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: default_method(),
            headers: BTreeMap::new(),
            request_body: String::new(),
            status_code: default_status_code(),
            request_timeout: default_request_timeout(),
            ca_bundle: String::new(),
            insecure_tls: false,
            jsonpath: String::new(),
            json_value: String::new(),
            timeout: default_timeout(),
            interval: default_interval(),
            consecutive_successes: default_consecutive_successes(),
            create_anyway_on_check_failure: false,
        }
    }
}

/// Outcome of an HTTP health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpReport {
    pub passed: bool,
    pub result: RetryResult,
    pub attempts: u32,
    /// Body of the last attempt whose status matched, empty otherwise
    pub result_body: String,
}

/// JSONPath template plus the regex its rendered value must match
#[derive(Debug)]
struct ValueCheck {
    template: JsonPathTemplate,
    value: Regex,
}

/// A validated HTTP check, ready to run
#[derive(Debug)]
pub struct HttpCheck {
    label: String,
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: String,
    status: StatusPattern,
    value_check: Option<ValueCheck>,
    client: Client,
    policy: RetryPolicy,
    timeout_ms: u64,
    create_anyway: bool,
}

impl HttpCheck {
    /// Validate `spec` and build the client
    ///
    /// Fatal problems are recorded in `diagnostics` as errors and returned.
    pub fn prepare(spec: &HttpCheckSpec, diagnostics: &mut Diagnostics) -> Result<Self> {
        Self::build(spec).map_err(|e| record_fatal(e, diagnostics))
    }

    fn build(spec: &HttpCheckSpec) -> Result<Self> {
        let url = Url::parse(&spec.url).map_err(|e| CheckError::InvalidUrl {
            url: spec.url.clone(),
            message: e.to_string(),
        })?;

        let method = if spec.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(spec.method.as_bytes()).map_err(|_| CheckError::InvalidMethod {
                method: spec.method.clone(),
            })?
        };

        let headers = build_headers(&spec.headers)?;
        let status = StatusPattern::parse(&spec.status_code)?;

        if !spec.ca_bundle.is_empty() && spec.insecure_tls {
            return Err(CheckError::ConflictingTls);
        }

        let value_check = match (spec.jsonpath.is_empty(), spec.json_value.is_empty()) {
            (true, true) => None,
            (false, false) => Some(ValueCheck {
                template: JsonPathTemplate::parse(&spec.jsonpath)?,
                value: Regex::new(&spec.json_value)
                    .map_err(|e| CheckError::invalid_regex(&spec.json_value, e))?,
            }),
            _ => return Err(CheckError::JsonPathPairing),
        };

        let policy = spec.retry_policy()?;

        let mut builder = Client::builder().danger_accept_invalid_certs(spec.insecure_tls);
        if spec.request_timeout > 0 {
            builder = builder.timeout(Duration::from_millis(spec.request_timeout));
        }

        if !spec.ca_bundle.is_empty() {
            let certificates = Certificate::from_pem_bundle(spec.ca_bundle.as_bytes()).map_err(|e| {
                CheckError::CaBundle {
                    message: e.to_string(),
                }
            })?;
            if certificates.is_empty() {
                return Err(CheckError::CaBundle {
                    message: "no PEM certificates found".to_string(),
                });
            }
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        let client = builder.build().map_err(CheckError::HttpClient)?;

        Ok(Self {
            label: spec.url.clone(),
            url,
            method,
            headers,
            body: spec.request_body.clone(),
            status,
            value_check,
            client,
            policy,
            timeout_ms: spec.timeout,
            create_anyway: spec.create_anyway_on_check_failure,
        })
    }

    /// Name used in log output, the URL unless set
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Probe until the policy reaches a terminal result
    pub async fn run(&self, cancellation: &CancellationToken, diagnostics: &mut Diagnostics) -> HttpReport {
        tracing::debug!(
            check = %self.label,
            method = %self.method,
            url = %self.url,
            timeout_ms = self.timeout_ms,
            "starting HTTP health check"
        );
        for (name, value) in &self.headers {
            tracing::debug!(check = %self.label, header = %name, value = ?value, "request header");
        }

        let mut attempt = HttpAttempt {
            check: self,
            warnings: Diagnostics::new(),
        };
        let session = RetryWindow::new(self.policy)
            .with_cancellation(cancellation.clone())
            .with_observer(TracingObserver::new(self.label.as_str()))
            .run(&mut attempt)
            .await;

        diagnostics.append(attempt.warnings);
        let passed = conclude(session.result, self.timeout_ms, self.create_anyway, diagnostics);

        HttpReport {
            passed,
            result: session.result,
            attempts: session.attempts,
            result_body: session.last_capture.flatten().unwrap_or_default(),
        }
    }
}

fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| CheckError::InvalidHeader {
            name: name.clone(),
            message: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| CheckError::InvalidHeader {
            name: name.clone(),
            message: e.to_string(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

struct HttpAttempt<'a> {
    check: &'a HttpCheck,
    warnings: Diagnostics,
}

impl Attempt for HttpAttempt<'_> {
    type Capture = Option<String>;

    async fn attempt(&mut self, attempt: u32, _consecutive_successes: u32) -> Verdict<Option<String>> {
        let check = self.check;

        let mut request = check
            .client
            .request(check.method.clone(), check.url.clone())
            .headers(check.headers.clone());
        if !check.body.is_empty() {
            request = request.body(check.body.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(check = %check.label, attempt, error = %e, "connection failure");
                self.warnings.add_warning(
                    "Connection failure",
                    format!("{} {} failed: {}", check.method, check.url, e),
                );
                return Verdict::fail(None);
            }
        };

        let code = response.status().as_u16();
        if !check.status.matches(code) {
            tracing::trace!(check = %check.label, attempt, status = code, "status code does not match {}", check.status);
            return Verdict::fail(None);
        }
        tracing::trace!(check = %check.label, attempt, status = code, "status code matched");

        let body = match response.text().await {
            Ok(body) => {
                tracing::debug!(check = %check.label, attempt, bytes = body.len(), "read response body");
                body
            }
            Err(e) => {
                tracing::warn!(check = %check.label, attempt, error = %e, "error reading body");
                String::new()
            }
        };

        let Some(value_check) = &check.value_check else {
            return Verdict::pass(Some(body));
        };

        let rendered = match value_check.template.execute_str(&body) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(check = %check.label, attempt, error = %e, "JSONPath evaluation failed");
                self.warnings.add_warning("JSONPath evaluation failed", e.to_string());
                return Verdict::fail(Some(body));
            }
        };

        if value_check.value.is_match(&rendered) {
            Verdict::pass(Some(body))
        } else {
            tracing::debug!(
                check = %check.label,
                attempt,
                value = %rendered,
                "JSONPath value does not match {}",
                value_check.value
            );
            self.warnings.add_warning(
                "Check failed",
                format!(
                    "JSONPath {} produced {:?}, which does not match {:?}",
                    value_check.template.as_str(),
                    rendered,
                    value_check.value.as_str()
                ),
            );
            Verdict::fail(Some(body))
        }
    }
}

/// Validate `spec` and run the check once
///
/// Returns an error only for fatal configuration problems. A check that
/// never passes still produces a report; its diagnostics say why.
pub async fn health_check(
    spec: &HttpCheckSpec,
    cancellation: &CancellationToken,
    diagnostics: &mut Diagnostics,
) -> Result<HttpReport> {
    let check = HttpCheck::prepare(spec, diagnostics)?;
    Ok(check.run(cancellation, diagnostics).await)
}
