use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Account resolved from a mobile ID token
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    pub local_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<IdentityUser>,
}

#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl IdentityClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(&base_url),
            api_key,
        }
    }

    fn lookup_url(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}/v1/accounts:lookup?key={}", self.base_url, key),
            None => format!("{}/v1/accounts:lookup", self.base_url),
        }
    }

    /// Verifies `id_token` with the identity provider and returns its account.
    pub async fn lookup(&self, id_token: &str) -> Result<IdentityUser, ServiceError> {
        let response = self
            .client
            .post(self.lookup_url())
            .json(&LookupRequest { id_token })
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            log::warn!("Identity provider rejected token with status {status}");
            return Err(ServiceError::Unauthorized("Invalid identity token".into()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!(
                "Identity lookup failed: {}",
                text
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(e.to_string()))?;

        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Unauthorized("Invalid identity token".into()))?;

        if user.disabled {
            return Err(ServiceError::Forbidden("Identity account is disabled".into()));
        }

        Ok(user)
    }
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_url_appends_api_key() {
        let client = IdentityClient::new("https://id.example.com/".into(), Some("k123".into()));
        assert_eq!(
            client.lookup_url(),
            "https://id.example.com/v1/accounts:lookup?key=k123"
        );
    }

    #[test]
    fn lookup_url_without_key() {
        let client = IdentityClient::new("http://localhost:9099".into(), None);
        assert_eq!(client.lookup_url(), "http://localhost:9099/v1/accounts:lookup");
    }

    #[test]
    fn lookup_response_parses_camel_case() {
        let body = r#"{"users":[{"localId":"uid-1","email":"a@b.co","displayName":"Ann","photoUrl":null}]}"#;
        let parsed: LookupResponse = serde_json::from_str(body).unwrap();
        let user = &parsed.users[0];
        assert_eq!(user.local_id, "uid-1");
        assert_eq!(user.display_name.as_deref(), Some("Ann"));
        assert!(!user.disabled);
    }
}
