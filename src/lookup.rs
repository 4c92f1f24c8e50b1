//! Client for the version lookup service.
//!
//! The service receives a list of `{name, version}` pairs and answers, for
//! each of them, with the versions already published under the same
//! major/minor line. Only the request/response contract lives here; merging
//! the answer into the run's state is the collector's job.

use crate::config::{
    REPOSITORY_GROUP, REST_CONNECTION_TIMEOUT, REST_INCLUDE_ALL, REST_MODE, REST_SOCKET_TIMEOUT,
    REST_URL, UserProps,
};
use crate::error::{ManipulationError, Result};
use crate::logging;
use regex::Regex;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const LOOKUP_PATH: &str = "reports/lookup/npm";
const API_VERSION_SEGMENT: &str = "v-1/";
const VERSION_FILTER: &str = "MAJOR_MINOR";
const LOG_CONTEXT_HEADER: &str = "Log-Context";

pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 600_000;

/// A package name and version as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Published versions keyed by the package they were requested for.
pub type LookupResult = BTreeMap<PackageRef, Vec<String>>;

/// Source of published versions.
pub trait VersionLookup {
    fn lookup(&self, packages: &[PackageRef]) -> Result<LookupResult>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    version_filter: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository_group: Option<&'a str>,
    include_all: bool,
    packages: &'a [PackageRef],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupReport {
    name: String,
    version: String,
    #[serde(default)]
    available_versions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorReport {
    error_type: Option<String>,
    error_message: Option<String>,
    details: Option<serde_json::Value>,
}

impl ErrorReport {
    fn message(&self) -> String {
        let mut message = String::new();
        if let Some(error_type) = &self.error_type {
            message.push_str(error_type);
        }
        if let Some(error_message) = &self.error_message {
            if !message.is_empty() {
                message.push_str(": ");
            }
            message.push_str(error_message);
        }
        if let Some(details) = self.details.as_ref().filter(|d| !d.is_null()) {
            message.push_str(&format!(" ({})", details));
        }
        if message.is_empty() {
            message.push_str("unknown error");
        }
        message
    }
}

/// Classified response body.
#[derive(Debug, PartialEq)]
pub enum LookupResponse {
    /// Empty body: the service has nothing to report.
    Empty,
    Versions(LookupResult),
    /// The service answered with an HTML page or a JSON error object.
    Error(String),
}

/// Classifies and parses a response body.
///
/// Fails only when the body is neither a version list nor a recognised
/// error shape.
pub fn parse_response(body: &str) -> Result<LookupResponse> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(LookupResponse::Empty);
    }

    if trimmed.starts_with('<') {
        let tags = Regex::new(r"<[^>]*>")?;
        let blank = Regex::new(r"\s*\n\s*")?;
        let text = tags.replace_all(trimmed, "");
        let text = blank.replace_all(text.trim(), " ");
        return Ok(LookupResponse::Error(text.into_owned()));
    }

    if trimmed.starts_with('{') {
        let report: ErrorReport = serde_json::from_str(trimmed).map_err(|e| {
            ManipulationError::Lookup(format!("unrecognised error response: {}", e))
        })?;
        return Ok(LookupResponse::Error(report.message()));
    }

    let reports: Vec<LookupReport> = serde_json::from_str(trimmed)
        .map_err(|e| ManipulationError::Lookup(format!("unparsable response: {}", e)))?;
    let versions = reports
        .into_iter()
        .filter_map(|r| {
            let available = r.available_versions?;
            Some((PackageRef::new(r.name, r.version), available))
        })
        .collect();
    Ok(LookupResponse::Versions(versions))
}

/// Builds the lookup endpoint from the configured base URL.
pub fn endpoint(rest_url: &str) -> String {
    let mut url = rest_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    if !url.ends_with(API_VERSION_SEGMENT) {
        url.push_str(API_VERSION_SEGMENT);
    }
    url.push_str(LOOKUP_PATH);
    url
}

/// Connection settings read from the run's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSettings {
    pub url: String,
    pub mode: Option<String>,
    pub repository_group: Option<String>,
    pub include_all: bool,
    pub connection_timeout: Duration,
    pub socket_timeout: Duration,
}

impl LookupSettings {
    /// Reads settings, or `None` when no lookup URL is configured.
    pub fn from_props(props: &UserProps) -> Option<Self> {
        let url = props.get_set(REST_URL)?;
        Some(Self {
            url: url.to_string(),
            mode: props.get_set(REST_MODE).map(str::to_string),
            repository_group: props.get_set(REPOSITORY_GROUP).map(str::to_string),
            include_all: props.parse_or(REST_INCLUDE_ALL, true),
            connection_timeout: Duration::from_millis(
                props.parse_or(REST_CONNECTION_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT_MS),
            ),
            socket_timeout: Duration::from_millis(
                props.parse_or(REST_SOCKET_TIMEOUT, DEFAULT_SOCKET_TIMEOUT_MS),
            ),
        })
    }
}

/// Blocking HTTP implementation of [`VersionLookup`].
pub struct RestLookupClient {
    endpoint: String,
    settings: LookupSettings,
    client: reqwest::blocking::Client,
}

impl RestLookupClient {
    pub fn new(settings: LookupSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(settings.connection_timeout)
            .timeout(settings.socket_timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint(&settings.url),
            settings,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn header_context() -> String {
        logging::context()
            .map(str::to_string)
            .unwrap_or_else(|| format!("npman-{}", uuid::Uuid::new_v4().simple()))
    }

    fn request(&self, packages: &[PackageRef]) -> Result<LookupResult> {
        let body = LookupRequest {
            version_filter: VERSION_FILTER,
            mode: self.settings.mode.as_deref(),
            repository_group: self.settings.repository_group.as_deref(),
            include_all: self.settings.include_all,
            packages,
        };
        log::debug!("POST {} {}", self.endpoint, serde_json::to_string(&body)?);

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(LOG_CONTEXT_HEADER, Self::header_context())
            .json(&body)
            .send()
            .map_err(|e| {
                ManipulationError::Lookup(format!(
                    "request to {} for {} package(s) failed: {}",
                    self.endpoint,
                    packages.len(),
                    e
                ))
            })?;

        let status = response.status();
        let text = response.text()?;
        log::debug!("Lookup service answered {}: {}", status, text);

        if !status.is_success() {
            let message = match parse_response(&text) {
                Ok(LookupResponse::Error(message)) => message,
                _ => text.trim().to_string(),
            };
            return Err(ManipulationError::Lookup(format!(
                "Received response status {} with message: {}",
                status.as_u16(),
                message
            )));
        }

        match parse_response(&text)? {
            LookupResponse::Empty => {
                log::info!("Lookup service returned no data");
                Ok(LookupResult::new())
            }
            LookupResponse::Error(message) => {
                log::warn!("Lookup service reported an error: {}", message);
                Ok(LookupResult::new())
            }
            LookupResponse::Versions(versions) => Ok(versions),
        }
    }
}

impl VersionLookup for RestLookupClient {
    fn lookup(&self, packages: &[PackageRef]) -> Result<LookupResult> {
        log::info!("Calling REST client...");
        let start = Instant::now();
        let result = self.request(packages);
        let elapsed = start.elapsed();
        log::info!(
            "REST client finished {}... (took {} min, {} sec, {} millisec)",
            if result.is_ok() { "successfully" } else { "with failures" },
            elapsed.as_secs() / 60,
            elapsed.as_secs() % 60,
            elapsed.subsec_millis()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serves one HTTP response and hands back the raw request.
    fn one_shot_server(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    fn settings(url: &str) -> LookupSettings {
        let props: UserProps = [(REST_URL, url), (REST_MODE, "SERVICE")].into_iter().collect();
        LookupSettings::from_props(&props).unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(endpoint("http://da"), "http://da/v-1/reports/lookup/npm");
        assert_eq!(endpoint("http://da/"), "http://da/v-1/reports/lookup/npm");
        assert_eq!(endpoint("http://da/v-1"), "http://da/v-1/reports/lookup/npm");
        assert_eq!(endpoint("http://da/v-1/"), "http://da/v-1/reports/lookup/npm");
    }

    #[test]
    fn test_settings_defaults() {
        let props: UserProps = [(REST_URL, "http://da"), (REST_SOCKET_TIMEOUT, "oops")]
            .into_iter()
            .collect();
        let settings = LookupSettings::from_props(&props).unwrap();
        assert!(settings.include_all);
        assert_eq!(settings.connection_timeout, Duration::from_millis(30_000));
        assert_eq!(settings.socket_timeout, Duration::from_millis(600_000));
        assert_eq!(settings.mode, None);

        assert!(LookupSettings::from_props(&UserProps::new()).is_none());
    }

    #[test]
    fn test_request_body_omits_empty_fields() {
        let packages = [PackageRef::new("a", "1.0.0")];
        let body = LookupRequest {
            version_filter: VERSION_FILTER,
            mode: None,
            repository_group: Some("npm-all"),
            include_all: true,
            packages: &packages,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "versionFilter": "MAJOR_MINOR",
                "repositoryGroup": "npm-all",
                "includeAll": true,
                "packages": [{ "name": "a", "version": "1.0.0" }]
            })
        );
    }

    #[test]
    fn test_parse_empty_body() {
        assert_eq!(parse_response("  \n").unwrap(), LookupResponse::Empty);
    }

    #[test]
    fn test_parse_versions() {
        let body = r#"[
            {"name": "a", "version": "1.0.0", "availableVersions": ["1.0.0-redhat-1"]},
            {"name": "b", "version": "2.0.0"}
        ]"#;
        let LookupResponse::Versions(versions) = parse_response(body).unwrap() else {
            panic!("expected versions");
        };
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[&PackageRef::new("a", "1.0.0")], vec!["1.0.0-redhat-1".to_string()]);
    }

    #[test]
    fn test_parse_error_shapes() {
        let json = r#"{"errorType": "COMMUNICATION_FAIL", "errorMessage": "Indy down", "details": null}"#;
        assert_eq!(
            parse_response(json).unwrap(),
            LookupResponse::Error("COMMUNICATION_FAIL: Indy down".to_string())
        );

        let html = "<html>\n<body><h1>502 Bad Gateway</h1>\n</body></html>";
        assert_eq!(
            parse_response(html).unwrap(),
            LookupResponse::Error("502 Bad Gateway".to_string())
        );

        assert!(matches!(
            parse_response("not json").unwrap_err(),
            ManipulationError::Lookup(_)
        ));
    }

    #[test]
    fn test_lookup_over_http() {
        let body = r#"[{"name": "a", "version": "1.0.0", "availableVersions": ["1.0.0-redhat-00001"]}]"#;
        let (url, server) = one_shot_server("200 OK", body);
        let client = RestLookupClient::new(settings(&url)).unwrap();

        let result = client.lookup(&[PackageRef::new("a", "1.0.0")]).unwrap();
        assert_eq!(
            result[&PackageRef::new("a", "1.0.0")],
            vec!["1.0.0-redhat-00001".to_string()]
        );

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v-1/reports/lookup/npm "));
        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("log-context: "));
        assert!(lower.contains("content-type: application/json"));
        assert!(request.contains(r#""mode":"SERVICE""#));
        assert!(request.contains(r#""versionFilter":"MAJOR_MINOR""#));
    }

    #[test]
    fn test_non_success_status_is_fatal() {
        let (url, server) = one_shot_server("500 Internal Server Error", r#"{"errorMessage": "boom"}"#);
        let client = RestLookupClient::new(settings(&url)).unwrap();

        let err = client.lookup(&[PackageRef::new("a", "1.0.0")]).unwrap_err();
        server.join().unwrap();
        let message = err.to_string();
        assert!(message.contains("500"), "{}", message);
        assert!(message.contains("boom"), "{}", message);
    }

    #[test]
    fn test_error_payload_with_success_status_is_no_data() {
        let (url, server) = one_shot_server("200 OK", r#"{"errorType": "X", "errorMessage": "y"}"#);
        let client = RestLookupClient::new(settings(&url)).unwrap();

        let result = client.lookup(&[PackageRef::new("a", "1.0.0")]).unwrap();
        server.join().unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_transport_failure_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = RestLookupClient::new(settings(&url)).unwrap();
        let err = client.lookup(&[PackageRef::new("a", "1.0.0")]).unwrap_err();
        assert!(matches!(err, ManipulationError::Lookup(_)));
    }
}
