use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

#[derive(Debug, Clone)]
pub struct PasswordGrantRequest {
    pub auth_endpoint: String,
    pub anon_key: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RefreshGrantRequest {
    pub auth_endpoint: String,
    pub anon_key: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub auth_endpoint: String,
    pub anon_key: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct MagicLinkRequest {
    pub auth_endpoint: String,
    pub anon_key: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct SignOutRequest {
    pub auth_endpoint: String,
    pub anon_key: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub user_id: String,
    pub email: Option<String>,
}

/// Sign-up either yields a live session or leaves the account pending email
/// confirmation, in which case `session` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResponse {
    pub session: Option<SessionResponse>,
}

#[async_trait]
pub trait AuthHttpClient: Send + Sync {
    async fn sign_in_with_password(
        &self,
        request: PasswordGrantRequest,
    ) -> Result<SessionResponse, InfraError>;

    async fn refresh_session(
        &self,
        request: RefreshGrantRequest,
    ) -> Result<SessionResponse, InfraError>;

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResponse, InfraError>;

    async fn send_magic_link(&self, request: MagicLinkRequest) -> Result<(), InfraError>;

    async fn sign_out(&self, request: SignOutRequest) -> Result<(), InfraError>;
}

/// GoTrue-convention HTTP client: JSON bodies, the project anon key as
/// `apikey` header, grant type selected via query parameter.
#[derive(Debug, Clone, Default)]
pub struct ReqwestAuthClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct GoTrueUserPayload {
    id: Option<String>,
    email: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct GoTrueSessionPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: Option<GoTrueUserPayload>,
    // GoTrue reports failures under differing keys across versions.
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
}

impl GoTrueSessionPayload {
    fn error_message(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.error.clone())
            .or_else(|| self.msg.clone())
    }
}

impl ReqwestAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn endpoint(auth_endpoint: &str, path: &str, grant_type: Option<&str>) -> Result<Url, InfraError> {
        let mut url = Url::parse(auth_endpoint)
            .map_err(|error| InfraError::Auth(format!("invalid auth endpoint: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Auth("auth endpoint cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push(path);
        }
        if let Some(grant_type) = grant_type {
            url.query_pairs_mut().append_pair("grant_type", grant_type);
        }
        Ok(url)
    }

    async fn post_json(
        &self,
        url: Url,
        anon_key: &str,
        bearer: Option<&str>,
        body: serde_json::Value,
    ) -> Result<GoTrueSessionPayload, InfraError> {
        let mut request = self
            .client
            .post(url)
            .header("apikey", anon_key)
            .json(&body);
        request = request.bearer_auth(bearer.unwrap_or(anon_key));

        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Auth(format!("request failed: {error}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| InfraError::Auth(format!("failed reading auth response: {error}")))?;

        if text.trim().is_empty() {
            if status.is_success() {
                return Ok(GoTrueSessionPayload {
                    access_token: None,
                    refresh_token: None,
                    expires_in: None,
                    user: None,
                    error: None,
                    error_description: None,
                    msg: None,
                });
            }
            return Err(InfraError::Auth(format!("auth error: http {}", status.as_u16())));
        }

        let parsed = serde_json::from_str::<GoTrueSessionPayload>(&text).map_err(|error| {
            InfraError::Auth(format!("invalid auth response payload: {error}; body={text}"))
        })?;

        if !status.is_success() || parsed.error_message().is_some() {
            let detail = parsed
                .error_message()
                .unwrap_or_else(|| format!("http {}", status.as_u16()));
            return Err(InfraError::Auth(format!("auth error: {detail}")));
        }
        Ok(parsed)
    }

    fn session_from_payload(payload: GoTrueSessionPayload) -> Result<SessionResponse, InfraError> {
        let access_token = payload
            .access_token
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| InfraError::Auth("auth response did not include access_token".to_string()))?;
        let user = payload
            .user
            .ok_or_else(|| InfraError::Auth("auth response did not include user".to_string()))?;
        let user_id = user
            .id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| InfraError::Auth("auth response did not include user id".to_string()))?;

        Ok(SessionResponse {
            access_token,
            refresh_token: payload.refresh_token,
            expires_in: payload.expires_in.unwrap_or(0).max(0),
            user_id,
            email: user.email,
        })
    }
}

#[async_trait]
impl AuthHttpClient for ReqwestAuthClient {
    async fn sign_in_with_password(
        &self,
        request: PasswordGrantRequest,
    ) -> Result<SessionResponse, InfraError> {
        let url = Self::endpoint(&request.auth_endpoint, "token", Some("password"))?;
        let payload = self
            .post_json(
                url,
                &request.anon_key,
                None,
                serde_json::json!({
                    "email": request.email,
                    "password": request.password,
                }),
            )
            .await?;
        Self::session_from_payload(payload)
    }

    async fn refresh_session(
        &self,
        request: RefreshGrantRequest,
    ) -> Result<SessionResponse, InfraError> {
        let url = Self::endpoint(&request.auth_endpoint, "token", Some("refresh_token"))?;
        let payload = self
            .post_json(
                url,
                &request.anon_key,
                None,
                serde_json::json!({
                    "refresh_token": request.refresh_token,
                }),
            )
            .await?;
        Self::session_from_payload(payload)
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResponse, InfraError> {
        let url = Self::endpoint(&request.auth_endpoint, "signup", None)?;
        let payload = self
            .post_json(
                url,
                &request.anon_key,
                None,
                serde_json::json!({
                    "email": request.email,
                    "password": request.password,
                }),
            )
            .await?;

        // No access token means the project requires email confirmation.
        if payload.access_token.is_none() {
            return Ok(SignUpResponse { session: None });
        }
        Ok(SignUpResponse {
            session: Some(Self::session_from_payload(payload)?),
        })
    }

    async fn send_magic_link(&self, request: MagicLinkRequest) -> Result<(), InfraError> {
        let url = Self::endpoint(&request.auth_endpoint, "magiclink", None)?;
        self.post_json(
            url,
            &request.anon_key,
            None,
            serde_json::json!({
                "email": request.email,
            }),
        )
        .await?;
        Ok(())
    }

    async fn sign_out(&self, request: SignOutRequest) -> Result<(), InfraError> {
        let url = Self::endpoint(&request.auth_endpoint, "logout", None)?;
        self.post_json(
            url,
            &request.anon_key,
            Some(&request.access_token),
            serde_json::json!({}),
        )
        .await?;
        Ok(())
    }
}
