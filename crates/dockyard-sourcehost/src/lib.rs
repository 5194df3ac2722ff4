//! Async API client for the source host (the code-hosting platform behind
//! the OAuth login and webhook delivery).
//!
//! The OAuth token-exchange dance itself is treated as an external
//! collaborator — this client is the "opaque fetch-user + persist-token"
//! seam the control plane talks to: an async `reqwest::Client` (the server
//! is a long-lived async service, unlike a one-shot CLI) covering a
//! repo-hosting platform's OAuth + webhook-lifecycle surface.
//!
//! Only one source-host shape is implemented — a second provider is out of
//! scope per spec's non-goals on multi-tenant breadth.

use serde::{Deserialize, Serialize};

use dockyard_types::Error;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_OAUTH_BASE: &str = "https://github.com";
const USER_AGENT: &str = concat!("dockyard/", env!("CARGO_PKG_VERSION"));

/// The authenticated user, as returned by the source host's `/user`
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUser {
    pub id: i64,
    pub login: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// A repository the authenticated user can deploy from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRepo {
    pub full_name: String,
    pub clone_url: String,
    pub default_branch: String,
    pub private: bool,
}

/// Result of exchanging an OAuth authorization code for an access token.
#[derive(Clone)]
pub struct ExchangeResult {
    pub access_token: String,
    pub user: SourceUser,
}

impl std::fmt::Debug for ExchangeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeResult")
            .field("access_token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    id: u64,
}

/// Async client for the source host's REST and OAuth endpoints.
#[derive(Clone)]
pub struct SourceHostClient {
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl SourceHostClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_bases(client_id, client_secret, DEFAULT_API_BASE, DEFAULT_OAUTH_BASE)
    }

    /// Construct a client pointed at custom API/OAuth base URLs, used by
    /// tests to aim at a local fake server.
    pub fn with_bases(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_base: impl Into<String>,
        oauth_base: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            oauth_base: oauth_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
        }
    }

    /// Build the consent-screen redirect URL the API's `/api/auth/<host>`
    /// handler sends the browser to.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/login/oauth/authorize?client_id={}&redirect_uri={}&state={}&scope=repo",
            self.oauth_base,
            urlencode(&self.client_id),
            urlencode(redirect_uri),
            urlencode(state),
        )
    }

    /// Exchange an OAuth authorization code for an access token, then fetch
    /// the authenticated user in the same round trip, backing
    /// `/api/auth/<host>/callback`.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ExchangeResult, Error> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.oauth_base))
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("oauth token exchange request failed: {e}")))?;

        let body: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("oauth token response was not valid json: {e}")))?;

        if let Some(error) = body.error {
            let description = body.error_description.unwrap_or_default();
            return Err(Error::Upstream(format!("oauth exchange rejected: {error} {description}")));
        }

        let access_token = body
            .access_token
            .ok_or_else(|| Error::Upstream("oauth response carried no access_token".into()))?;

        let user = self.fetch_authenticated_user(&access_token).await?;

        Ok(ExchangeResult { access_token, user })
    }

    /// Fetch the authenticated user for a previously-exchanged access token.
    pub async fn fetch_authenticated_user(&self, access_token: &str) -> Result<SourceUser, Error> {
        let response = self
            .authed_get(access_token, "/user")
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("failed to fetch authenticated user: {e}")))?;

        check_status(&response)?;
        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("user response was not valid json: {e}")))
    }

    /// List repositories the authenticated user can deploy from, backing
    /// `GET /api/repos?page&page_size`.
    pub async fn list_repos(
        &self,
        access_token: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<SourceRepo>, Error> {
        let response = self
            .authed_get(access_token, "/user/repos")
            .query(&[("page", page.to_string()), ("per_page", page_size.to_string())])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("failed to list repos: {e}")))?;

        check_status(&response)?;
        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("repo list response was not valid json: {e}")))
    }

    /// Create a push webhook on `repo_full_name` pointed at `callback_url`,
    /// signed with `secret`. Returns the source host's webhook id.
    ///
    /// Project creation treats a failure here as best-effort per spec
    /// §4.6: the caller does not roll back project creation, it just
    /// leaves `webhook_id`/`sealed_webhook_secret` unset.
    pub async fn create_webhook(
        &self,
        access_token: &str,
        repo_full_name: &str,
        callback_url: &str,
        secret: &str,
    ) -> Result<String, Error> {
        let body = serde_json::json!({
            "name": "web",
            "active": true,
            "events": ["push"],
            "config": {
                "url": callback_url,
                "content_type": "json",
                "secret": secret,
            }
        });

        let response = self
            .http
            .post(format!("{}/repos/{repo_full_name}/hooks", self.api_base))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("failed to create webhook: {e}")))?;

        check_status(&response)?;
        let created: WebhookResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("webhook creation response was not valid json: {e}")))?;
        Ok(created.id.to_string())
    }

    /// Tear down a webhook, called when a project is deleted.
    pub async fn delete_webhook(
        &self,
        access_token: &str,
        repo_full_name: &str,
        webhook_id: &str,
    ) -> Result<(), Error> {
        let response = self
            .http
            .delete(format!("{}/repos/{repo_full_name}/hooks/{webhook_id}", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("failed to delete webhook: {e}")))?;

        // A webhook already gone on the source host (404) is not an error
        // from the caller's perspective — the desired end state is reached.
        if response.status().as_u16() == 404 {
            return Ok(());
        }
        check_status(&response)?;
        Ok(())
    }

    fn authed_get(&self, access_token: &str, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(access_token)
            .header("Accept", "application/vnd.github+json")
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), Error> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(Error::Upstream(format!(
        "source host responded with status {}",
        response.status()
    )))
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_encodes_parameters() {
        let client = SourceHostClient::new("client-id", "client-secret");
        let url = client.authorize_url("https://dockyard.example/callback", "state-123");
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fdockyard.example%2Fcallback"));
        assert!(url.contains("state=state-123"));
    }

    #[test]
    fn exchange_result_debug_redacts_token() {
        let result = ExchangeResult {
            access_token: "ghp_supersecrettoken".into(),
            user: SourceUser {
                id: 1,
                login: "octocat".into(),
                email: None,
                avatar_url: None,
            },
        };
        let debug = format!("{result:?}");
        assert!(!debug.contains("ghp_supersecrettoken"));
    }

    #[tokio::test]
    async fn exchange_code_surfaces_oauth_error() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let body = r#"{"error":"bad_verification_code","error_description":"expired"}"#;
                let response = tiny_http::Response::from_string(body)
                    .with_header(tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
                let _ = request.respond(response);
            }
        });

        let client = SourceHostClient::with_bases(
            "id",
            "secret",
            "http://127.0.0.1:1",
            format!("http://{addr}"),
        );
        let result = client.exchange_code("bad-code", "https://example.com/callback").await;
        assert!(matches!(result, Err(Error::Upstream(_))));
        handle.join().unwrap();
    }
}
