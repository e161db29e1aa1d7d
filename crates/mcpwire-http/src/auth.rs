//! Client-side authorization hooks.
//!
//! The transport never runs an OAuth flow itself. It asks an
//! [`Authenticator`] for the current bearer token on every request and, when
//! the server answers 401, hands it an [`UnauthorizedContext`] built from the
//! `WWW-Authenticate` challenge so it can obtain new credentials.
//!
//! ```text
//! WWW-Authenticate: Bearer resource_metadata="https://api.example.com/.well-known/oauth-protected-resource", scope="files:read"
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use url::Url;

/// Authorization failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    /// The server rejected the credentials and no new ones could be obtained
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The authenticator does not support the requested step
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// An interactive flow failed or was abandoned
    #[error("Authorization flow failed: {0}")]
    Flow(String),
}

/// Which stored credentials to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScope {
    /// Everything
    All,
    /// Client registration
    Client,
    /// Access and refresh tokens
    Tokens,
    /// PKCE verifier of an unfinished flow
    Verifier,
}

/// What the server said when it answered 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthorizedContext {
    /// `resource_metadata` parameter of the challenge
    pub resource_metadata_url: Option<Url>,
    /// `scope` parameter of the challenge
    pub scope: Option<String>,
    /// Endpoint that was being called
    pub url: Url,
}

impl UnauthorizedContext {
    /// Build a context from an optional `WWW-Authenticate` value
    pub fn from_challenge(url: Url, www_authenticate: Option<&str>) -> Self {
        let params = www_authenticate.map(challenge_params).unwrap_or_default();
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        };
        Self {
            resource_metadata_url: param("resource_metadata").and_then(|v| Url::parse(&v).ok()),
            scope: param("scope"),
            url,
        }
    }
}

/// Supplies bearer tokens and reacts to 401 responses.
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Current access token, if any
    fn tokens(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;

    /// Obtain credentials after a 401. On `Ok` the request is retried once.
    fn authorize(
        &self,
        context: UnauthorizedContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + '_>>;

    /// Complete an interactive flow with the authorization `code`
    fn finish_authorization<'a>(
        &'a self,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + 'a>>;

    /// Forget stored credentials. Called when freshly obtained ones were rejected.
    fn invalidate_credentials(&self, scope: CredentialScope) {
        let _ = scope;
    }
}

/// A fixed bearer token. Cannot recover from a 401.
#[derive(Clone)]
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    /// Send `token` on every request
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn tokens(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { Some(self.token.clone()) })
    }

    fn authorize(
        &self,
        context: UnauthorizedContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + '_>> {
        Box::pin(async move {
            Err(AuthError::Unauthorized(format!(
                "static token rejected by {}",
                context.url
            )))
        })
    }

    fn finish_authorization<'a>(
        &'a self,
        _code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + 'a>> {
        Box::pin(async move {
            Err(AuthError::NotSupported(
                "static tokens have no interactive flow".to_string(),
            ))
        })
    }
}

/// Split the auth-params of a challenge into `(name, value)` pairs.
///
/// Quoted values may contain commas and backslash escapes.
fn challenge_params(header: &str) -> Vec<(String, String)> {
    // Drop the scheme token
    let rest = match header.trim_start().split_once(char::is_whitespace) {
        Some((scheme, rest)) if !scheme.contains('=') => rest,
        _ => header,
    };

    let mut params = Vec::new();
    let mut chars = rest.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        let name: String =
            std::iter::from_fn(|| chars.next_if(|c| *c != '=' && *c != ',')).collect();
        if name.trim().is_empty() {
            break;
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => break,
                    c => value.push(c),
                }
            }
        } else {
            value.extend(std::iter::from_fn(|| chars.next_if(|c| *c != ',')));
            value = value.trim().to_string();
        }
        params.push((name.trim().to_string(), value));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn endpoint() -> Url {
        Url::parse("https://api.example.com/mcp").unwrap()
    }

    #[test]
    fn test_challenge_with_resource_metadata_and_scope() {
        let context = UnauthorizedContext::from_challenge(
            endpoint(),
            Some(
                r#"Bearer resource_metadata="https://api.example.com/.well-known/oauth-protected-resource", scope="files:read files:write""#,
            ),
        );
        assert_eq!(
            context.resource_metadata_url.unwrap().as_str(),
            "https://api.example.com/.well-known/oauth-protected-resource"
        );
        assert_eq!(context.scope.as_deref(), Some("files:read files:write"));
    }

    #[test]
    fn test_challenge_params_quoting() {
        let params = challenge_params(r#"Bearer realm="a, \"b\"", error=invalid_token"#);
        assert_eq!(
            params,
            vec![
                ("realm".to_string(), r#"a, "b""#.to_string()),
                ("error".to_string(), "invalid_token".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_or_invalid_challenge() {
        let context = UnauthorizedContext::from_challenge(endpoint(), None);
        assert_eq!(context.resource_metadata_url, None);

        let challenge = r#"Bearer resource_metadata="not a url""#;
        let context = UnauthorizedContext::from_challenge(endpoint(), Some(challenge));
        assert_eq!(context.resource_metadata_url, None);
    }

    #[tokio::test]
    async fn test_static_token_authenticator() {
        let auth = StaticTokenAuthenticator::new("secret");
        assert_eq!(auth.tokens().await.as_deref(), Some("secret"));
        assert!(!format!("{auth:?}").contains("secret"));
        assert!(matches!(
            auth.authorize(UnauthorizedContext::from_challenge(endpoint(), None))
                .await,
            Err(AuthError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.finish_authorization("code").await,
            Err(AuthError::NotSupported(_))
        ));
    }
}
