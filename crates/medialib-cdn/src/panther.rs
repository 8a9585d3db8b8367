//! Panther Portal (CDNetworks) flush client.
//!
//! The portal exposes a SOAP `flush` operation:
//!
//! - `username`, `password`: credentials of a user with web service access
//! - `flushtype`: `"all"` or `"paths"` (always `"paths"` here)
//! - `siteId`: numeric site id
//! - `paths`: newline-separated list of paths
//! - `wildcard`: wildcard mode, only valid with `"paths"`
//! - `use_ims`: If-Modified-Since refetch, only valid with `"all"` or wildcard
//!
//! The request goes to the `soap:address` location declared by the WSDL
//! (fetched once), unless `PANTHER_ENDPOINT` names the endpoint directly.
//!
//! A response of "Over the limit of flush requests per hour" means every
//! request is rejected until the hourly quota resets.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{CdnError, CdnResult};
use crate::metrics::record_flush;
use crate::Cdn;

pub const DEFAULT_WSDL_URL: &str = "https://pantherportal.cdnetworks.com/wsdl/flush.wsdl";

/// Response text of an accepted flush.
pub const FLUSH_SUCCESS: &str = "Flush successfully submitted.";

/// Marker of the hourly quota rejection.
pub const RATE_LIMIT_MARKER: &str = "Over the limit of flush requests per hour";

/// Configuration for the Panther Portal client.
#[derive(Debug, Clone)]
pub struct PantherConfig {
    /// Public base path the CDN serves media from
    pub path: String,
    pub username: String,
    pub password: String,
    pub site_id: String,
    /// Service description declaring the SOAP endpoint
    pub wsdl_url: String,
    /// SOAP endpoint; resolved from the WSDL when unset
    pub endpoint: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl PantherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> CdnResult<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| CdnError::config(format!("{} not set", name)))
        };

        Ok(Self {
            path: required("CDN_PATH")?,
            username: required("PANTHER_USERNAME")?,
            password: required("PANTHER_PASSWORD")?,
            site_id: required("PANTHER_SITE_ID")?,
            wsdl_url: std::env::var("PANTHER_WSDL")
                .unwrap_or_else(|_| DEFAULT_WSDL_URL.to_string()),
            endpoint: std::env::var("PANTHER_ENDPOINT").ok(),
            timeout: Duration::from_secs(
                std::env::var("CDN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// CDN client flushing through the Panther Portal web service.
pub struct PantherPortal {
    http: Client,
    config: PantherConfig,
    endpoint: OnceCell<String>,
}

impl PantherPortal {
    pub fn new(config: PantherConfig) -> CdnResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(CdnError::Network)?;

        let endpoint = match &config.endpoint {
            Some(endpoint) => OnceCell::new_with(Some(endpoint.clone())),
            None => OnceCell::new(),
        };

        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    pub fn from_env() -> CdnResult<Self> {
        Self::new(PantherConfig::from_env()?)
    }

    fn envelope(&self, paths: &[String]) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
                "<soap:Body><flush>",
                "<username>{}</username>",
                "<password>{}</password>",
                "<flushtype>paths</flushtype>",
                "<siteId>{}</siteId>",
                "<paths>{}</paths>",
                "<wildcard>true</wildcard>",
                "<use_ims>false</use_ims>",
                "</flush></soap:Body></soap:Envelope>"
            ),
            xml_escape(&self.config.username),
            xml_escape(&self.config.password),
            xml_escape(&self.config.site_id),
            xml_escape(&paths.join("\n")),
        )
    }

    fn request_error(&self, e: reqwest::Error) -> CdnError {
        if e.is_timeout() {
            CdnError::Timeout(self.config.timeout.as_secs())
        } else {
            CdnError::Network(e)
        }
    }

    /// SOAP endpoint, read from the WSDL on first use.
    async fn endpoint(&self) -> CdnResult<&str> {
        let endpoint = self
            .endpoint
            .get_or_try_init(|| async {
                let response = self
                    .http
                    .get(&self.config.wsdl_url)
                    .send()
                    .await
                    .map_err(|e| self.request_error(e))?;

                let status = response.status();
                let body = response.text().await?;
                if !status.is_success() {
                    return Err(CdnError::InvalidResponse(format!(
                        "WSDL {}: HTTP {}",
                        self.config.wsdl_url, status
                    )));
                }

                let location = wsdl_location(&body).ok_or_else(|| {
                    CdnError::InvalidResponse(format!(
                        "WSDL {} declares no soap:address",
                        self.config.wsdl_url
                    ))
                })?;
                debug!(endpoint = %location, "Resolved Panther Portal endpoint");
                Ok::<String, CdnError>(location)
            })
            .await?;

        Ok(endpoint.as_str())
    }

    async fn submit(&self, paths: &[String]) -> CdnResult<String> {
        let endpoint = self.endpoint().await?;
        let response = self
            .http
            .post(endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "flush")
            .body(self.envelope(paths))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await?;
        let result = soap_result(&body)
            .ok_or_else(|| CdnError::InvalidResponse(format!("HTTP {}: {}", status, body)))?;

        Ok(result)
    }
}

#[async_trait]
impl Cdn for PantherPortal {
    fn path(&self, relative_path: &str, _flushable: bool) -> String {
        format!("{}/{}", self.config.path, relative_path)
    }

    async fn flush_paths(&self, paths: &[String]) -> CdnResult<()> {
        if paths.is_empty() {
            return Ok(());
        }

        debug!(site_id = %self.config.site_id, count = paths.len(), "Submitting CDN flush");

        let outcome = match self.submit(paths).await {
            Ok(result) if result == FLUSH_SUCCESS => Ok(()),
            Ok(result) if result.contains(RATE_LIMIT_MARKER) => Err(CdnError::RateLimited(result)),
            Ok(result) => Err(CdnError::FlushFailed(result)),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(()) => {
                record_flush("panther", "ok", paths.len());
                info!(count = paths.len(), "CDN flush submitted");
            }
            Err(e) => {
                record_flush("panther", e.kind(), paths.len());
                warn!(error = %e, "CDN flush rejected");
            }
        }

        outcome
    }
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// `location` attribute of the first `soap:address` element.
fn wsdl_location(wsdl: &str) -> Option<String> {
    let lower = wsdl.to_ascii_lowercase();
    let start = lower.find(":address")?;
    let end = start + lower[start..].find('>')?;
    let tag = &wsdl[start..end];

    let attr = tag.to_ascii_lowercase().find("location=")? + "location=".len();
    let quote = tag[attr..].chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value_start = attr + 1;
    let value_end = value_start + tag[value_start..].find(quote)?;

    Some(xml_unescape(&tag[value_start..value_end]))
}

/// Text content of the SOAP body, tags stripped.
fn soap_result(body: &str) -> Option<String> {
    let lower = body.to_ascii_lowercase();
    let start = lower.find(":body").or_else(|| lower.find("<body"))?;
    let content_start = start + body[start..].find('>')? + 1;
    let content_end = lower.rfind(":body").or_else(|| lower.rfind("</body"))?;
    if content_end <= content_start {
        return None;
    }

    let inner = &body[content_start..content_end];
    let mut text = String::new();
    let mut in_tag = false;
    for c in inner.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }

    Some(xml_unescape(text.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn soap_response(result: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">"#,
                "<SOAP-ENV:Body><ns1:flushResponse><return>{}</return></ns1:flushResponse>",
                "</SOAP-ENV:Body></SOAP-ENV:Envelope>"
            ),
            result
        )
    }

    fn wsdl(location: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<definitions xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/">"#,
                r#"<service name="FlushService"><port name="FlushPort" binding="tns:FlushBinding">"#,
                r#"<soap:address location="{}"/>"#,
                "</port></service></definitions>"
            ),
            location
        )
    }

    fn config(endpoint: String) -> PantherConfig {
        PantherConfig {
            path: "https://cdn.example.com/media".to_string(),
            username: "user".to_string(),
            password: "p<ss&".to_string(),
            site_id: "42".to_string(),
            wsdl_url: "http://localhost/wsdl/flush.wsdl".to_string(),
            endpoint: Some(endpoint),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_soap_result_extraction() {
        assert_eq!(
            soap_result(&soap_response(FLUSH_SUCCESS)).as_deref(),
            Some(FLUSH_SUCCESS)
        );
        assert_eq!(soap_result("not xml"), None);
    }

    #[test]
    fn test_wsdl_location() {
        assert_eq!(
            wsdl_location(&wsdl("https://portal.example.com/soap/flush?a=1&amp;b=2")).as_deref(),
            Some("https://portal.example.com/soap/flush?a=1&b=2")
        );
        assert_eq!(wsdl_location("<definitions/>"), None);
    }

    #[tokio::test]
    async fn test_flush_resolves_endpoint_from_wsdl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wsdl/flush.wsdl"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(wsdl(&format!("{}/soap/flush", server.uri()))),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/soap/flush"))
            .respond_with(ResponseTemplate::new(200).set_body_string(soap_response(FLUSH_SUCCESS)))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = config(String::new());
        config.wsdl_url = format!("{}/wsdl/flush.wsdl", server.uri());
        config.endpoint = None;
        let cdn = PantherPortal::new(config).unwrap();

        cdn.flush("default/0001/01/a.jpg").await.unwrap();
        cdn.flush("default/0001/01/b.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_wsdl_without_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<definitions/>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = config(String::new());
        config.wsdl_url = format!("{}/wsdl/flush.wsdl", server.uri());
        config.endpoint = None;
        let cdn = PantherPortal::new(config).unwrap();

        let err = cdn.flush("default/0001/01/a.jpg").await.unwrap_err();
        assert!(matches!(err, CdnError::InvalidResponse(_)));
    }

    #[test]
    fn test_envelope_escapes_values() {
        let cdn = PantherPortal::new(config("http://localhost".into())).unwrap();
        let envelope = cdn.envelope(&["a/1.jpg".to_string(), "a/2.jpg".to_string()]);
        assert!(envelope.contains("<password>p&lt;ss&amp;</password>"));
        assert!(envelope.contains("<paths>a/1.jpg\na/2.jpg</paths>"));
        assert!(envelope.contains("<flushtype>paths</flushtype>"));
        assert!(envelope.contains("<wildcard>true</wildcard>"));
        assert!(envelope.contains("<use_ims>false</use_ims>"));
    }

    #[tokio::test]
    async fn test_flush_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/flush"))
            .and(header("SOAPAction", "flush"))
            .and(body_string_contains("<siteId>42</siteId>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(soap_response(FLUSH_SUCCESS)))
            .expect(1)
            .mount(&server)
            .await;

        let cdn = PantherPortal::new(config(format!("{}/flush", server.uri()))).unwrap();
        cdn.flush_paths(&["default/0011/24/thumb_1023457_big.jpg".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_flush_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(soap_response(RATE_LIMIT_MARKER)),
            )
            .mount(&server)
            .await;

        let cdn = PantherPortal::new(config(format!("{}/flush", server.uri()))).unwrap();
        let err = cdn.flush("default/a.jpg").await.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_flush_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string(soap_response("Invalid site id")),
            )
            .mount(&server)
            .await;

        let cdn = PantherPortal::new(config(format!("{}/flush", server.uri()))).unwrap();
        let err = cdn.flush_by_string("default/*").await.unwrap_err();
        assert!(matches!(err, CdnError::FlushFailed(ref msg) if msg == "Invalid site id"));
    }

    #[tokio::test]
    async fn test_empty_flush_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cdn = PantherPortal::new(config(format!("{}/flush", server.uri()))).unwrap();
        cdn.flush_paths(&[]).await.unwrap();
    }

    #[test]
    fn test_public_path() {
        let cdn = PantherPortal::new(config("http://localhost".into())).unwrap();
        assert_eq!(
            cdn.path("default/0001/01/a.jpg", true),
            "https://cdn.example.com/media/default/0001/01/a.jpg"
        );
    }
}
