//! Privilege Cloud REST client.
//!
//! Authenticates once against the tenant's identity service (OAuth2 client
//! credentials) and then talks to the `PasswordVault` API with the bearer
//! token. Transient failures (429 and 5xx, network errors) are retried with
//! exponential backoff and jitter.

use std::fmt;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::types::{
    CredentialRecord, MemberGrant, SafeMemberRecord, SafePayload, SafeRecord, VaultPayload,
    VaultRecord,
};
use crate::{ClientError, EntityId, Kind, VaultClient};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const USER_AGENT: &str = concat!("pcloud-sync/", env!("CARGO_PKG_VERSION"));

/// Connection settings for an already-authenticated client.
#[derive(Clone)]
pub struct HttpVaultConfig {
    /// API base URL, e.g. `https://acme.privilegecloud.cyberark.cloud/PasswordVault/API`.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
    /// Per-request timeout. Zero means the default (10s).
    pub timeout: Duration,
    /// Retries for transient failures of reads and deletes. Zero disables
    /// retrying.
    pub max_retries: u32,
}

impl Default for HttpVaultConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl fmt::Debug for HttpVaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpVaultConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Provider credentials for the identity service.
#[derive(Clone)]
pub struct AuthConfig {
    /// OAuth2 token endpoint.
    pub identity_url: String,
    /// API base URL used once authenticated.
    pub api_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl AuthConfig {
    /// Derive both endpoints from the tenant id and the Privilege Cloud
    /// subdomain.
    pub fn for_tenant(
        tenant: &str,
        domain: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            identity_url: format!("https://{tenant}.id.cyberark.cloud/oauth2/platformtoken"),
            api_base_url: format!("https://{domain}.privilegecloud.cyberark.cloud/PasswordVault/API"),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("identity_url", &self.identity_url)
            .field("api_base_url", &self.api_base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Vault client backed by the Privilege Cloud REST API.
///
/// Cheap to clone; clones share the connection pool and token.
#[derive(Clone)]
pub struct HttpVault {
    base_url: String,
    token: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl fmt::Debug for HttpVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpVault")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "ErrorCode")]
    code: Option<String>,
    #[serde(rename = "ErrorMessage")]
    message: Option<String>,
}

impl HttpVault {
    /// Create a client around an existing bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the token or base URL is empty.
    #[allow(clippy::needless_pass_by_value)]
    pub fn with_config(cfg: HttpVaultConfig) -> Result<Self, ClientError> {
        if cfg.token.trim().is_empty() {
            return Err(ClientError::Config("missing bearer token".to_owned()));
        }
        let base_url = cfg.base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(ClientError::Config("missing API base URL".to_owned()));
        }

        let timeout = if cfg.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            cfg.timeout
        };
        Ok(Self {
            base_url,
            token: cfg.token.clone(),
            max_retries: cfg.max_retries,
            client: build_client(timeout)?,
        })
    }

    /// Exchange the provider's client credentials for a bearer token and
    /// return a client that uses it.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` for empty credentials and
    /// `ClientError::Auth` if the identity service refuses them or answers
    /// without a token.
    pub async fn authenticate(auth: AuthConfig) -> Result<Self, ClientError> {
        if auth.client_id.trim().is_empty() || auth.client_secret.is_empty() {
            return Err(ClientError::Config(
                "missing client id or client secret".to_owned(),
            ));
        }
        let client = build_client(if auth.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            auth.timeout
        })?;

        tracing::debug!(identity_url = %auth.identity_url, "requesting platform token");
        let resp = client
            .post(&auth.identity_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", auth.client_id.as_str()),
                ("client_secret", auth.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout
                } else {
                    ClientError::Network(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Auth(format!(
                "identity service returned HTTP {}",
                status.as_u16()
            )));
        }
        let body: TokenResponse = resp.json().await?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::Auth("identity service returned no token".to_owned()))?;

        Self::with_config(HttpVaultConfig {
            base_url: auth.api_base_url,
            token,
            timeout: auth.timeout,
            max_retries: auth.max_retries,
        })
    }

    async fn create_safe(&self, payload: &SafePayload) -> Result<EntityId, ClientError> {
        let body = serde_json::to_value(payload)?;
        let record: SafeRecord = self.request(Method::POST, "/Safes", Some(body)).await?;

        let url_id = record.safe_url_id.unwrap_or_default();
        let id = EntityId::Safe {
            url_id: url_id.clone(),
            number: record.safe_number.unwrap_or_default(),
        };
        if id.is_empty() {
            return Ok(id);
        }

        self.add_member(&url_id, &payload.owner)
            .await
            .map_err(|source| ClientError::SeedMember {
                safe_url_id: url_id.clone(),
                source: Box::new(source),
            })?;
        Ok(id)
    }

    async fn add_member(
        &self,
        safe_url_id: &str,
        grant: &MemberGrant,
    ) -> Result<SafeMemberRecord, ClientError> {
        let path = format!("/Safes/{}/Members", urlencoding::encode(safe_url_id));
        match self
            .request(Method::POST, &path, Some(grant.to_body()))
            .await
        {
            Err(ClientError::Api {
                status_code: 404, ..
            }) => Err(ClientError::NotFound {
                kind: Kind::SafeObject,
                id: safe_url_id.to_owned(),
            }),
            other => other,
        }
    }

    /// Send one request. Reads and deletes are retried on transient
    /// failures; creates are sent exactly once, since a failed response
    /// does not prove the vault did not commit the write.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let max_retries = if is_idempotent(&method) {
            self.max_retries
        } else {
            0
        };
        let mut last_err = None;

        for attempt in 0..=max_retries {
            let mut req = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.token);
            if let Some(ref b) = body {
                req = req.json(b);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let text = resp.text().await?;
                        if text.trim().is_empty() {
                            // DELETE answers with no content.
                            return Ok(serde_json::from_str("{}")?);
                        }
                        return Ok(serde_json::from_str(&text)?);
                    }

                    let error_text = resp.text().await.unwrap_or_default();
                    let msg = serde_json::from_str::<ApiErrorBody>(&error_text)
                        .ok()
                        .and_then(|b| match (b.code, b.message) {
                            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                            (None, Some(message)) => Some(message),
                            (code, None) => code,
                        })
                        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(ClientError::Auth(msg));
                    }

                    let retryable = is_retryable(status);
                    last_err = Some(ClientError::Api {
                        status_code: status.as_u16(),
                        message: msg,
                    });

                    if attempt < max_retries && retryable {
                        tracing::warn!(%method, path, status = status.as_u16(), attempt, "retrying vault request");
                        sleep_with_jitter(attempt).await;
                        continue;
                    }
                }
                Err(e) => {
                    last_err = Some(if e.is_timeout() {
                        ClientError::Timeout
                    } else {
                        ClientError::Network(e)
                    });

                    if attempt < max_retries {
                        tracing::warn!(%method, path, attempt, "retrying vault request after transport error");
                        sleep_with_jitter(attempt).await;
                        continue;
                    }
                }
            }

            break;
        }

        Err(last_err.unwrap_or(ClientError::Api {
            status_code: 0,
            message: "unknown error".to_owned(),
        }))
    }
}

fn entity_path(id: &EntityId) -> String {
    match id {
        EntityId::Credential { id } => format!("/Accounts/{}", urlencoding::encode(id)),
        EntityId::Safe { url_id, .. } => format!("/Safes/{}", urlencoding::encode(url_id)),
        EntityId::SafeMember {
            safe_url_id,
            member,
        } => format!(
            "/Safes/{}/Members/{}",
            urlencoding::encode(safe_url_id),
            urlencoding::encode(member)
        ),
    }
}

fn not_found_as(kind: Kind, id: &EntityId, err: ClientError) -> ClientError {
    match err {
        ClientError::Api {
            status_code: 404, ..
        } => ClientError::NotFound {
            kind,
            id: id.to_string(),
        },
        other => other,
    }
}

#[async_trait::async_trait]
impl VaultClient for HttpVault {
    async fn create_entity(&self, payload: &VaultPayload) -> Result<EntityId, ClientError> {
        tracing::debug!(kind = %payload.kind(), "creating vault entity");
        match payload {
            VaultPayload::Credential(account) => {
                let body = serde_json::to_value(account)?;
                let record: CredentialRecord =
                    self.request(Method::POST, "/Accounts", Some(body)).await?;
                Ok(EntityId::credential(record.id.unwrap_or_default()))
            }
            VaultPayload::Safe(safe) => self.create_safe(safe).await,
            VaultPayload::SafeMember(member) => {
                let record = self.add_member(&member.safe_name, &member.grant).await?;
                Ok(EntityId::SafeMember {
                    safe_url_id: record
                        .safe_url_id
                        .unwrap_or_else(|| member.safe_name.clone()),
                    member: record
                        .member_name
                        .unwrap_or_else(|| member.grant.member_name.clone()),
                })
            }
        }
    }

    async fn get_entity(&self, id: &EntityId, kind: Kind) -> Result<VaultRecord, ClientError> {
        if !id.fits(kind) {
            return Err(ClientError::KindMismatch {
                kind,
                id: id.to_string(),
            });
        }
        let path = entity_path(id);
        let record = match id {
            EntityId::Credential { .. } => self
                .request::<CredentialRecord>(Method::GET, &path, None)
                .await
                .map(VaultRecord::Credential),
            EntityId::Safe { .. } => self
                .request::<SafeRecord>(Method::GET, &path, None)
                .await
                .map(VaultRecord::Safe),
            EntityId::SafeMember { .. } => self
                .request::<SafeMemberRecord>(Method::GET, &path, None)
                .await
                .map(VaultRecord::SafeMember),
        };
        record.map_err(|e| not_found_as(kind, id, e))
    }

    async fn delete_entity(&self, id: &EntityId, kind: Kind) -> Result<(), ClientError> {
        if !id.fits(kind) {
            return Err(ClientError::KindMismatch {
                kind,
                id: id.to_string(),
            });
        }
        self.request::<serde_json::Value>(Method::DELETE, &entity_path(id), None)
            .await
            .map(|_| ())
            .map_err(|e| not_found_as(kind, id, e))
    }

    fn auth_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(ClientError::Network)
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::DELETE)
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn sleep_with_jitter(attempt: u32) {
    // Base delay is 500ms and attempts are few, so the product stays small.
    #[allow(clippy::cast_possible_truncation)]
    let base = (RETRY_BASE_DELAY.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    let jitter = base * 3 / 10 * jitter_permille() / 1000;
    tokio::time::sleep(Duration::from_millis(base.saturating_add(jitter))).await;
}

/// Pseudo-random value in `[0, 1000)` from the clock's sub-second nanos.
fn jitter_permille() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    u64::from(nanos % 1000)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{
        AccountProperties, AwsProperties, CredentialPayload, PermissionLevel, SafeMemberPayload,
        SecretManagement,
    };
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vault_for(server: &MockServer) -> HttpVault {
        HttpVault::with_config(HttpVaultConfig {
            base_url: server.uri(),
            token: "test-token".to_owned(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        })
        .unwrap()
    }

    fn aws_payload() -> VaultPayload {
        VaultPayload::Credential(CredentialPayload {
            name: "svc-1".to_owned(),
            address: None,
            user_name: "svc".to_owned(),
            platform_id: "AWSAccessKeys".to_owned(),
            safe_name: "Cloud".to_owned(),
            secret_type: "key".to_owned(),
            secret: "AKIA-secret".to_owned(),
            platform_account_properties: AccountProperties::Aws(AwsProperties {
                access_key_id: "AKIA123".to_owned(),
                account_id: "111122223333".to_owned(),
                alias: None,
                region: None,
            }),
            secret_management: SecretManagement::default(),
        })
    }

    fn grant(member: &str) -> MemberGrant {
        MemberGrant {
            member_name: member.to_owned(),
            member_type: "user".to_owned(),
            permission_level: PermissionLevel::Read,
        }
    }

    fn safe_payload() -> VaultPayload {
        VaultPayload::Safe(SafePayload {
            safe_name: "Ops".to_owned(),
            description: None,
            location: None,
            managing_cpm: None,
            number_of_days_retention: None,
            number_of_versions_retention: None,
            auto_purge_enabled: None,
            owner: grant("alice"),
        })
    }

    #[test]
    fn config_requires_token_and_url() {
        let err = HttpVault::with_config(HttpVaultConfig {
            base_url: "https://x".to_owned(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));

        let err = HttpVault::with_config(HttpVaultConfig {
            token: "t".to_owned(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn tenant_endpoints_are_derived() {
        let auth = AuthConfig::for_tenant("abc123", "acme", "id", "secret");
        assert_eq!(
            auth.identity_url,
            "https://abc123.id.cyberark.cloud/oauth2/platformtoken"
        );
        assert_eq!(
            auth.api_base_url,
            "https://acme.privilegecloud.cyberark.cloud/PasswordVault/API"
        );
        assert!(!format!("{auth:?}").contains("secret\""));
    }

    #[test]
    fn debug_hides_token() {
        let vault = HttpVault::with_config(HttpVaultConfig {
            base_url: "https://x".to_owned(),
            token: "very-private".to_owned(),
            ..Default::default()
        })
        .unwrap();
        assert!(!format!("{vault:?}").contains("very-private"));
    }

    #[tokio::test]
    async fn authenticate_exchanges_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/platformtoken"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=svc-user"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "abc", "token_type": "Bearer"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let vault = HttpVault::authenticate(AuthConfig {
            identity_url: format!("{}/oauth2/platformtoken", server.uri()),
            api_base_url: format!("{}/PasswordVault/API", server.uri()),
            client_id: "svc-user".to_owned(),
            client_secret: "pw".to_owned(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        })
        .await
        .unwrap();
        assert_eq!(vault.auth_token().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn authenticate_rejection_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = HttpVault::authenticate(AuthConfig {
            identity_url: server.uri(),
            api_base_url: server.uri(),
            client_id: "svc-user".to_owned(),
            client_secret: "wrong".to_owned(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
    }

    #[tokio::test]
    async fn create_account_returns_vault_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "name": "svc-1",
                "platformAccountProperties": {"AWSAccessKeyID": "AKIA123"}
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "CRED-42"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = vault_for(&server)
            .create_entity(&aws_payload())
            .await
            .unwrap();
        assert_eq!(id, EntityId::credential("CRED-42"));
    }

    #[tokio::test]
    async fn create_account_without_id_yields_empty_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let id = vault_for(&server)
            .create_entity(&aws_payload())
            .await
            .unwrap();
        assert!(id.is_empty());
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Accounts/9_9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "ErrorCode": "PASWS013E",
                "ErrorMessage": "Account not found"
            })))
            .mount(&server)
            .await;

        let err = vault_for(&server)
            .get_entity(&EntityId::credential("9_9"), Kind::AwsCredential)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound { kind: Kind::AwsCredential, .. }));
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Safes/Ops"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Safes/Ops"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "safeUrlId": "Ops",
                "safeNumber": 7,
                "safeName": "Ops"
            })))
            .mount(&server)
            .await;

        let id = EntityId::Safe {
            url_id: "Ops".to_owned(),
            number: 7,
        };
        let record = vault_for(&server)
            .get_entity(&id, Kind::SafeObject)
            .await
            .unwrap();
        let VaultRecord::Safe(safe) = record else {
            panic!("expected a safe record");
        };
        assert_eq!(safe.safe_number, Some(7));
    }

    #[tokio::test]
    async fn create_is_sent_once_even_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Accounts"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "77_1"})),
            )
            .expect(0)
            .mount(&server)
            .await;

        let err = vault_for(&server)
            .create_entity(&aws_payload())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status_code: 500, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zero_retries_sends_reads_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Accounts/1_1"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let vault = HttpVault::with_config(HttpVaultConfig {
            base_url: server.uri(),
            token: "test-token".to_owned(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap();
        let err = vault
            .get_entity(&EntityId::credential("1_1"), Kind::DbCredential)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status_code: 503, .. }));
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = vault_for(&server)
            .delete_entity(&EntityId::credential("1_1"), Kind::DbCredential)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/Accounts/1_1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        vault_for(&server)
            .delete_entity(&EntityId::credential("1_1"), Kind::DbCredential)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn safe_creation_adds_seed_member() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Safes"))
            .and(body_partial_json(serde_json::json!({"safeName": "Ops"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "safeUrlId": "Ops",
                "safeNumber": 12
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Safes/Ops/Members"))
            .and(body_partial_json(serde_json::json!({
                "memberName": "alice",
                "permissions": {"listAccounts": true, "useAccounts": true}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "safeUrlId": "Ops",
                "memberName": "alice"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = vault_for(&server)
            .create_entity(&safe_payload())
            .await
            .unwrap();
        assert_eq!(
            id,
            EntityId::Safe {
                url_id: "Ops".to_owned(),
                number: 12
            }
        );
    }

    #[tokio::test]
    async fn seed_member_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Safes"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "safeUrlId": "Ops",
                "safeNumber": 12
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Safes/Ops/Members"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ErrorCode": "SFWS0012E",
                "ErrorMessage": "Member does not exist"
            })))
            .mount(&server)
            .await;

        let err = vault_for(&server)
            .create_entity(&safe_payload())
            .await
            .unwrap_err();
        let ClientError::SeedMember {
            safe_url_id,
            source,
        } = err
        else {
            panic!("expected a seed member error");
        };
        assert_eq!(safe_url_id, "Ops");
        assert!(matches!(*source, ClientError::Api { status_code: 400, .. }));
    }

    #[tokio::test]
    async fn member_of_missing_safe_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Safes/Nowhere/Members"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let payload = VaultPayload::SafeMember(SafeMemberPayload {
            safe_name: "Nowhere".to_owned(),
            grant: grant("bob"),
        });
        let err = vault_for(&server)
            .create_entity(&payload)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound { kind: Kind::SafeObject, .. }));
    }

    #[tokio::test]
    async fn member_id_falls_back_to_granted_member() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Safes/Ops/Members"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"safeUrlId": "Ops"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let payload = VaultPayload::SafeMember(SafeMemberPayload {
            safe_name: "Ops".to_owned(),
            grant: grant("bob"),
        });
        let id = vault_for(&server).create_entity(&payload).await.unwrap();
        assert_eq!(
            id,
            EntityId::SafeMember {
                safe_url_id: "Ops".to_owned(),
                member: "bob".to_owned()
            }
        );
    }
}
