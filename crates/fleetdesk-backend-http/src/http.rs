//! reqwest adapter for the identity API
//!
//! Tokens are held in memory only; the durable snapshot never sees them.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use fleetdesk_api::{Profile, Session, UserIdentity, UserRole};
use fleetdesk_backend::{AuthBackend, BackendError, BackendResult};
use fleetdesk_config::BackendConfig;
use fleetdesk_util::UserId;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Wire format for credential sign-in
#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
    redirect_url: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordUpdateRequest<'a> {
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ProfileUpdateRequest<'a> {
    display_name: &'a str,
}

/// Token grant response from the identity API
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Lifetime of the access token in seconds
    expires_in: i64,
    user: UserDto,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct ProfileDto {
    id: String,
    display_name: String,
    role: UserRole,
    #[serde(default)]
    organizations: Vec<String>,
    updated_at: chrono::DateTime<chrono::Local>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: fleetdesk_util::now() + ChronoDuration::seconds(self.expires_in),
            user: UserIdentity {
                id: UserId::new(self.user.id),
                email: self.user.email,
            },
        }
    }
}

impl ProfileDto {
    fn into_profile(self) -> Profile {
        Profile {
            id: UserId::new(self.id),
            display_name: self.display_name,
            role: self.role,
            organizations: self.organizations,
            updated_at: self.updated_at,
        }
    }
}

/// reqwest-based identity backend.
///
/// Holds the current token pair in memory; `get_session` answers from it and
/// `refresh_session` rotates it.
pub struct HttpAuthBackend {
    client: Client,
    base_url: String,
    anon_key: Option<String>,
    current: RwLock<Option<Session>>,
}

impl HttpAuthBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            current: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_headers(
        &self,
        request: reqwest::RequestBuilder,
        bearer: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = match &self.anon_key {
            Some(key) => request.header("apikey", key),
            None => request,
        };
        match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn bearer(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    async fn token_grant(
        &self,
        path: &str,
        body: impl Serialize,
        invalid_credentials_on_401: bool,
    ) -> BackendResult<Session> {
        let response = self
            .apply_headers(self.client.post(self.url(path)), None)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| BackendError::Network(e.to_string()))?;
            let session = token.into_session();
            *self.current.write().await = Some(session.clone());
            debug!(user_id = %session.user.id, "Token grant succeeded");
            Ok(session)
        } else if invalid_credentials_on_401
            && (status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST)
        {
            Err(BackendError::InvalidCredentials)
        } else {
            Err(BackendError::Rejected(format!(
                "token grant failed with status {}",
                status
            )))
        }
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> BackendResult<Session> {
        self.token_grant("/auth/v1/sign-in", SignInRequest { email, password }, true)
            .await
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        Ok(self.current.read().await.clone())
    }

    async fn refresh_session(&self) -> BackendResult<Session> {
        let refresh_token = {
            let current = self.current.read().await;
            current
                .as_ref()
                .map(|s| s.refresh_token.clone())
                .ok_or(BackendError::NoSession)?
        };

        self.token_grant(
            "/auth/v1/refresh",
            RefreshRequest {
                refresh_token: &refresh_token,
            },
            false,
        )
        .await
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let bearer = self.bearer().await;

        // The local token pair is dropped regardless of the revoke outcome
        let result = match bearer {
            Some(token) => {
                let response = self
                    .apply_headers(self.client.post(self.url("/auth/v1/sign-out")), Some(&token))
                    .send()
                    .await
                    .map_err(|e| BackendError::Network(e.to_string()))?;

                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(BackendError::Rejected(format!(
                        "sign-out failed with status {}",
                        response.status()
                    )))
                }
            }
            None => Ok(()),
        };

        *self.current.write().await = None;
        result
    }

    async fn fetch_profile_by_id(&self, user_id: &UserId) -> BackendResult<Option<Profile>> {
        let bearer = self.bearer().await;
        let response = self
            .apply_headers(
                self.client
                    .get(self.url(&format!("/api/v1/profiles/{}", user_id))),
                bearer.as_deref(),
            )
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            Ok(None)
        } else if status.is_success() {
            let dto: ProfileDto = response
                .json()
                .await
                .map_err(|e| BackendError::Network(e.to_string()))?;
            Ok(Some(dto.into_profile()))
        } else {
            Err(BackendError::Rejected(format!(
                "profile fetch failed with status {}",
                status
            )))
        }
    }

    async fn reset_password_for_email(&self, email: &str, redirect_url: &str)
    -> BackendResult<()> {
        let response = self
            .apply_headers(self.client.post(self.url("/auth/v1/recover")), None)
            .json(&RecoverRequest {
                email,
                redirect_url,
            })
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Rejected(format!(
                "password reset failed with status {}",
                response.status()
            )))
        }
    }

    async fn update_password(&self, new_password: &str) -> BackendResult<()> {
        let bearer = self.bearer().await.ok_or(BackendError::NoSession)?;

        let response = self
            .apply_headers(self.client.put(self.url("/auth/v1/password")), Some(&bearer))
            .json(&PasswordUpdateRequest {
                password: new_password,
            })
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Rejected(format!(
                "password update failed with status {}",
                response.status()
            )))
        }
    }

    async fn update_profile(&self, user_id: &UserId, display_name: &str)
    -> BackendResult<Profile> {
        let bearer = self.bearer().await;
        let response = self
            .apply_headers(
                self.client
                    .patch(self.url(&format!("/api/v1/profiles/{}", user_id))),
                bearer.as_deref(),
            )
            .json(&ProfileUpdateRequest { display_name })
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            Err(BackendError::ProfileNotFound(user_id.clone()))
        } else if status.is_success() {
            let dto: ProfileDto = response
                .json()
                .await
                .map_err(|e| BackendError::Network(e.to_string()))?;
            Ok(dto.into_profile())
        } else {
            Err(BackendError::Rejected(format!(
                "profile update failed with status {}",
                status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_to_session() {
        let json = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": { "id": "user-1", "email": "tech@depot.example" }
        }"#;

        let token: TokenResponse = serde_json::from_str(json).unwrap();
        let session = token.into_session();

        assert_eq!(session.access_token, "at");
        assert_eq!(session.user.id, UserId::new("user-1"));
        let remaining = session.seconds_remaining(fleetdesk_util::now());
        assert!(remaining > 3590 && remaining <= 3600);
    }

    #[test]
    fn profile_dto_to_profile() {
        let json = r#"{
            "id": "user-1",
            "display_name": "Dana Reyes",
            "role": "supervisor",
            "organizations": ["depot-north"],
            "updated_at": "2026-08-01T10:00:00+00:00"
        }"#;

        let dto: ProfileDto = serde_json::from_str(json).unwrap();
        let profile = dto.into_profile();

        assert_eq!(profile.role, UserRole::Supervisor);
        assert_eq!(profile.organizations, vec!["depot-north".to_string()]);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpAuthBackend::new(&BackendConfig {
            base_url: "https://identity.fleetdesk.example/".into(),
            anon_key: None,
        })
        .unwrap();

        assert_eq!(
            backend.url("/auth/v1/sign-in"),
            "https://identity.fleetdesk.example/auth/v1/sign-in"
        );
    }
}
