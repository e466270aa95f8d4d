//! Token sources for the resource manager.
//!
//! [`DefaultCredential`] tries, in order: a service principal secret from the
//! environment, the managed identity endpoint, and the Azure CLI. Sources that
//! are not configured on this machine report [`ArmError::CredentialUnavailable`]
//! and the chain moves on; any other failure stops the chain.

use std::{env, io::ErrorKind, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::{process::Command, sync::Mutex};

use crate::{arm::ArmError, infra::secrets::sanitize_response_body};

const REFRESH_MARGIN_SECS: i64 = 300;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3_600;
const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken, ArmError>;
}

/// Resource URI form of a `.default` scope, as the v1 token endpoints expect.
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Service principal authenticated with a client secret.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority_host: &str,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.trim_end_matches('/').to_owned(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
    pub fn from_env(http: reqwest::Client, authority_host: &str) -> Option<Self> {
        let tenant_id = non_empty_env("AZURE_TENANT_ID")?;
        let client_id = non_empty_env("AZURE_CLIENT_ID")?;
        let client_secret = non_empty_env("AZURE_CLIENT_SECRET")?;

        Some(Self::new(
            http,
            authority_host,
            tenant_id,
            client_id,
            client_secret,
        ))
    }

    fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "ClientSecretCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, ArmError> {
        tracing::debug!(
            client_id = %self.client_id,
            tenant_id = %self.tenant_id,
            "requesting token with client secret"
        );

        let response = self
            .http
            .post(self.token_endpoint())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %sanitize_response_body(&body),
                "token request rejected"
            );
            return Err(ArmError::Authentication(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let token: OAuthTokenResponse = serde_json::from_str(&body).map_err(|error| {
            ArmError::Authentication(format!("failed to parse token response: {error}"))
        })?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Ok(AccessToken::new(
            token.access_token,
            Utc::now() + chrono::Duration::seconds(expires_in),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct ManagedIdentityResponse {
    access_token: String,
    expires_on: Option<String>,
    expires_in: Option<String>,
}

/// Where a managed identity token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentityEndpoint {
    /// App Service / Functions, `IDENTITY_ENDPOINT` + `IDENTITY_HEADER`.
    AppService { url: String, header: String },
    /// VM instance metadata service. On hosts outside Azure anything may
    /// answer here, so every failure counts as "not available".
    Imds { url: String },
}

/// Managed identity through App Service's `IDENTITY_ENDPOINT` or the VM
/// instance metadata service.
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    client_id: Option<String>,
    endpoint: IdentityEndpoint,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client) -> Self {
        let endpoint = match (
            non_empty_env("IDENTITY_ENDPOINT"),
            non_empty_env("IDENTITY_HEADER"),
        ) {
            (Some(url), Some(header)) => IdentityEndpoint::AppService { url, header },
            _ => IdentityEndpoint::Imds {
                url: IMDS_ENDPOINT.to_owned(),
            },
        };

        Self {
            http,
            client_id: non_empty_env("AZURE_CLIENT_ID"),
            endpoint,
        }
    }

    #[cfg(test)]
    fn with_endpoint(http: reqwest::Client, endpoint: IdentityEndpoint) -> Self {
        Self {
            http,
            client_id: None,
            endpoint,
        }
    }

    fn request(&self, resource: &str) -> reqwest::RequestBuilder {
        let mut query = vec![("resource", resource.to_owned())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }

        match &self.endpoint {
            IdentityEndpoint::AppService { url, header } => {
                query.push(("api-version", "2019-08-01".to_owned()));
                self.http
                    .get(url.as_str())
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header.as_str())
            }
            IdentityEndpoint::Imds { url } => {
                query.push(("api-version", "2018-02-01".to_owned()));
                self.http
                    .get(url.as_str())
                    .query(&query)
                    .header("Metadata", "true")
                    .timeout(IMDS_PROBE_TIMEOUT)
            }
        }
    }

    fn is_imds(&self) -> bool {
        matches!(self.endpoint, IdentityEndpoint::Imds { .. })
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, ArmError> {
        let response = self
            .request(scope_to_resource(scope))
            .send()
            .await
            .map_err(|error| {
                ArmError::CredentialUnavailable(format!(
                    "managed identity endpoint unreachable: {error}"
                ))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::NOT_FOUND
        {
            return Err(ArmError::CredentialUnavailable(format!(
                "no managed identity assigned (HTTP {status})"
            )));
        }

        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %sanitize_response_body(&body),
                "managed identity token request rejected"
            );
            let message = format!("managed identity endpoint returned HTTP {status}");
            return Err(if self.is_imds() {
                ArmError::CredentialUnavailable(message)
            } else {
                ArmError::Authentication(message)
            });
        }

        let token: ManagedIdentityResponse = serde_json::from_str(&body).map_err(|error| {
            let message = format!("failed to parse managed identity token: {error}");
            if self.is_imds() {
                ArmError::CredentialUnavailable(message)
            } else {
                ArmError::Authentication(message)
            }
        })?;

        let expires_at = token
            .expires_on
            .as_deref()
            .and_then(|value| value.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                token
                    .expires_in
                    .as_deref()
                    .and_then(|value| value.parse::<i64>().ok())
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            })
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(DEFAULT_EXPIRES_IN_SECS));

        Ok(AccessToken::new(token.access_token, expires_at))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    expires_on: Option<String>,
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

/// Token issued by the signed-in Azure CLI (`az login`).
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential;

impl AzureCliCredential {
    fn parse_output(stdout: &[u8]) -> Result<AccessToken, ArmError> {
        let token: CliTokenResponse = serde_json::from_slice(stdout).map_err(|error| {
            ArmError::Authentication(format!("failed to parse Azure CLI token: {error}"))
        })?;

        let expires_at = token
            .expires_on_epoch
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| token.expires_on.as_deref().and_then(parse_cli_local_time))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(DEFAULT_EXPIRES_IN_SECS));

        Ok(AccessToken::new(token.access_token, expires_at))
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, ArmError> {
        let output = Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--output",
                "json",
                "--resource",
                scope_to_resource(scope),
            ])
            .output()
            .await
            .map_err(|error| match error.kind() {
                ErrorKind::NotFound => {
                    ArmError::CredentialUnavailable("Azure CLI is not installed".to_owned())
                }
                _ => ArmError::CredentialUnavailable(format!("failed to run Azure CLI: {error}")),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("az login") {
                return Err(ArmError::CredentialUnavailable(
                    "Azure CLI is not logged in; run `az login`".to_owned(),
                ));
            }
            return Err(ArmError::Authentication(format!(
                "Azure CLI token request failed: {}",
                sanitize_response_body(stderr.trim())
            )));
        }

        Self::parse_output(&output.stdout)
    }
}

fn parse_cli_local_time(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    chrono::Local
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// Environment-driven chain of credential sources with a per-scope token cache.
pub struct DefaultCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    cache: Mutex<Option<(String, AccessToken)>>,
}

impl DefaultCredential {
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            cache: Mutex::new(None),
        }
    }

    pub fn from_env(http: &reqwest::Client, authority_host: &str) -> Self {
        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();
        if let Some(secret) = ClientSecretCredential::from_env(http.clone(), authority_host) {
            sources.push(Box::new(secret));
        }
        sources.push(Box::new(ManagedIdentityCredential::new(http.clone())));
        sources.push(Box::new(AzureCliCredential));

        Self::new(sources)
    }

    async fn acquire(&self, scope: &str) -> Result<AccessToken, ArmError> {
        let mut unavailable = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    tracing::info!(source = source.name(), "acquired management token");
                    return Ok(token);
                }
                Err(ArmError::CredentialUnavailable(reason)) => {
                    tracing::debug!(source = source.name(), %reason, "credential source skipped");
                    unavailable.push(format!("{}: {reason}", source.name()));
                }
                Err(error) => return Err(error),
            }
        }

        Err(ArmError::CredentialUnavailable(unavailable.join("; ")))
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    fn name(&self) -> &'static str {
        "DefaultCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, ArmError> {
        let mut cache = self.cache.lock().await;
        if let Some((cached_scope, token)) = cache.as_ref() {
            if cached_scope == scope && token.is_fresh(Utc::now()) {
                return Ok(token.clone());
            }
        }

        let token = self.acquire(scope).await?;
        *cache = Some((scope.to_owned(), token.clone()));
        Ok(token)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use wiremock::{
        matchers::{body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    struct CountingCredential {
        calls: Arc<AtomicUsize>,
        outcome: fn() -> Result<AccessToken, ArmError>,
    }

    #[async_trait]
    impl TokenCredential for CountingCredential {
        fn name(&self) -> &'static str {
            "CountingCredential"
        }

        async fn get_token(&self, _scope: &str) -> Result<AccessToken, ArmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn counting(
        outcome: fn() -> Result<AccessToken, ArmError>,
    ) -> (Box<dyn TokenCredential>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(CountingCredential {
                calls: calls.clone(),
                outcome,
            }),
            calls,
        )
    }

    fn fresh_token() -> Result<AccessToken, ArmError> {
        Ok(AccessToken::new(
            "token-a",
            Utc::now() + chrono::Duration::hours(1),
        ))
    }

    fn unavailable() -> Result<AccessToken, ArmError> {
        Err(ArmError::CredentialUnavailable("not configured".to_owned()))
    }

    fn rejected() -> Result<AccessToken, ArmError> {
        Err(ArmError::Authentication("bad secret".to_owned()))
    }

    #[tokio::test]
    async fn chain_skips_unavailable_sources() {
        let (first, first_calls) = counting(unavailable);
        let (second, second_calls) = counting(fresh_token);
        let chain = DefaultCredential::new(vec![first, second]);

        let token = chain
            .get_token("https://management.azure.com/.default")
            .await
            .expect("second source should supply a token");

        assert_eq!(token.secret, "token-a");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chain_stops_on_authentication_failure() {
        let (first, _) = counting(rejected);
        let (second, second_calls) = counting(fresh_token);
        let chain = DefaultCredential::new(vec![first, second]);

        let error = chain.get_token("scope").await.expect_err("must fail");

        assert!(matches!(error, ArmError::Authentication(_)));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chain_reports_every_unavailable_source() {
        let (first, _) = counting(unavailable);
        let (second, _) = counting(unavailable);
        let chain = DefaultCredential::new(vec![first, second]);

        let error = chain.get_token("scope").await.expect_err("must fail");

        match error {
            ArmError::CredentialUnavailable(reason) => {
                assert_eq!(reason.matches("not configured").count(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chain_caches_fresh_token_per_scope() {
        let (source, calls) = counting(fresh_token);
        let chain = DefaultCredential::new(vec![source]);

        chain.get_token("scope-a").await.expect("first call");
        chain.get_token("scope-a").await.expect("cached call");
        chain.get_token("scope-b").await.expect("other scope");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn token_close_to_expiry_is_not_fresh() {
        let now = Utc::now();
        let token = AccessToken::new("t", now + chrono::Duration::seconds(60));

        assert!(!token.is_fresh(now));
        assert!(format!("{token:?}").contains("[REDACTED]"));
    }

    #[test]
    fn scope_maps_to_resource_uri() {
        assert_eq!(
            scope_to_resource("https://management.azure.com/.default"),
            "https://management.azure.com"
        );
        assert_eq!(scope_to_resource("custom"), "custom");
    }

    #[test]
    fn parses_cli_output_with_epoch_expiry() {
        let token = AzureCliCredential::parse_output(
            br#"{"accessToken":"cli-token","expiresOn":"2030-01-01 00:00:00.000000","expires_on":1893456000,"tokenType":"Bearer"}"#,
        )
        .expect("cli output parses");

        assert_eq!(token.secret, "cli-token");
        assert_eq!(token.expires_at.timestamp(), 1_893_456_000);
    }

    #[test]
    fn parses_cli_output_with_local_time_expiry() {
        let token = AzureCliCredential::parse_output(
            br#"{"accessToken":"cli-token","expiresOn":"2030-06-01 12:30:00.000000"}"#,
        )
        .expect("cli output parses");

        assert!(token.expires_at.timestamp() > 1_893_456_000);
    }

    #[tokio::test]
    async fn client_secret_credential_posts_client_credentials_grant() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "sp-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            &server.uri(),
            "tenant-1",
            "app-1",
            "shh",
        );

        let token = credential
            .get_token("https://management.azure.com/.default")
            .await
            .expect("token should be issued");

        assert_eq!(token.secret, "sp-token");
        assert!(token.is_fresh(Utc::now()));
    }

    #[tokio::test]
    async fn client_secret_credential_maps_rejection_to_authentication_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client"
            })))
            .mount(&server)
            .await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            &server.uri(),
            "tenant-1",
            "app-1",
            "wrong",
        );

        let error = credential.get_token("scope").await.expect_err("must fail");

        assert!(matches!(error, ArmError::Authentication(_)));
        assert!(error.to_string().contains("401"));
    }

    fn imds_at(server: &MockServer) -> ManagedIdentityCredential {
        ManagedIdentityCredential::with_endpoint(
            reqwest::Client::new(),
            IdentityEndpoint::Imds {
                url: format!("{}/metadata/identity/oauth2/token", server.uri()),
            },
        )
    }

    #[tokio::test]
    async fn imds_issues_token_with_metadata_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/metadata/identity/oauth2/token"))
            .and(header("Metadata", "true"))
            .and(query_param("resource", "https://management.azure.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mi-token",
                "expires_on": "1893456000",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = imds_at(&server)
            .get_token("https://management.azure.com/.default")
            .await
            .expect("token should be issued");

        assert_eq!(token.secret, "mi-token");
        assert_eq!(token.expires_at.timestamp(), 1_893_456_000);
    }

    #[tokio::test]
    async fn imds_rejections_leave_the_chain_open() {
        for response in [
            ResponseTemplate::new(403).set_body_string("forbidden"),
            ResponseTemplate::new(502).set_body_string("bad gateway"),
            ResponseTemplate::new(200).set_body_string("<html>captive portal</html>"),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(response)
                .mount(&server)
                .await;

            let error = imds_at(&server)
                .get_token("https://management.azure.com/.default")
                .await
                .expect_err("imds must not issue a token");

            assert!(
                matches!(error, ArmError::CredentialUnavailable(_)),
                "unexpected error: {error:?}"
            );
        }
    }

    #[tokio::test]
    async fn app_service_identity_rejection_stops_the_chain() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(header("X-IDENTITY-HEADER", "secret-header"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::with_endpoint(
            reqwest::Client::new(),
            IdentityEndpoint::AppService {
                url: format!("{}/msi/token", server.uri()),
                header: "secret-header".to_owned(),
            },
        );

        let error = credential
            .get_token("https://management.azure.com/.default")
            .await
            .expect_err("rejection must fail");

        assert!(matches!(error, ArmError::Authentication(_)));
    }
}
