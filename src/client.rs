use std::marker::PhantomData;

use reqwest::{header, Client, Method, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// One of the provider's REST APIs. Each family has its own base URL and its
/// own API key.
pub trait ApiFamily {
    const DEFAULT_ENDPOINT: &'static str;
}

#[derive(Clone)]
pub struct Credentials {
    username: String,
    api_key: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let api_key = api_key.into();
        if username.is_empty() {
            return Err(Error::EmptyCredential("username"));
        }
        if api_key.is_empty() {
            return Err(Error::EmptyCredential("API key"));
        }
        Ok(Self { username, api_key })
    }
}

// Keep the key out of logs and error reports.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// HTTP session bound to one API family: every request is resolved against
/// the family endpoint and carries the Basic credentials.
///
/// Responses come back untouched; status checks belong to the caller.
#[derive(Debug)]
pub struct ApiClient<F: ApiFamily> {
    client: Client,
    credentials: Credentials,
    endpoint: Url,
    family: PhantomData<F>,
}

impl<F: ApiFamily> ApiClient<F> {
    pub fn new(credentials: Credentials, endpoint: Option<&str>) -> Result<Self> {
        let endpoint = endpoint.unwrap_or(F::DEFAULT_ENDPOINT);
        let endpoint = Url::parse(endpoint).map_err(|source| Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self {
            client: create_client()?,
            credentials,
            endpoint,
            family: PhantomData,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Resolve `url` against the endpoint. An absolute `url` replaces the
    /// endpoint altogether.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.endpoint
            .join(url)
            .map_err(|source| Error::InvalidEndpoint {
                endpoint: url.to_string(),
                source,
            })
    }

    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let url = self.resolve(url)?;
        debug!(%method, %url, "request");
        Ok(self
            .client
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.api_key)))
    }

    pub fn get(&self, url: &str) -> Result<RequestBuilder> {
        self.request(Method::GET, url)
    }
}

pub fn create_client() -> Result<Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.append(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    Client::builder()
        .default_headers(headers)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[cfg(test)]
mod test {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Debug)]
    struct Family;

    impl ApiFamily for Family {
        const DEFAULT_ENDPOINT: &'static str = "https://api.example.com/family/v1/";
    }

    fn client(endpoint: Option<&str>) -> ApiClient<Family> {
        ApiClient::new(Credentials::new("user", "secret").unwrap(), endpoint).unwrap()
    }

    #[test]
    fn test_create_client() {
        let _client = create_client().unwrap();
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(
            client(None).endpoint().as_str(),
            "https://api.example.com/family/v1/"
        );
    }

    #[test]
    fn test_resolve_joins_relative_paths() {
        let client = client(None);
        assert_eq!(
            client.resolve("nodes/abc").unwrap().as_str(),
            "https://api.example.com/family/v1/nodes/abc"
        );
        assert_eq!(
            client.resolve("https://other.example.com/x").unwrap().as_str(),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_rejects_empty_credentials() {
        assert!(matches!(
            Credentials::new("", "key"),
            Err(Error::EmptyCredential("username"))
        ));
        assert!(matches!(
            Credentials::new("user", ""),
            Err(Error::EmptyCredential("API key"))
        ));
    }

    #[test]
    fn test_rejects_malformed_endpoint() {
        let result =
            ApiClient::<Family>::new(Credentials::new("user", "key").unwrap(), Some("not a url"));
        assert!(matches!(result, Err(Error::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let creds = Credentials::new("user", "secret").unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn test_request_sends_basic_auth() {
        let server = MockServer::start().await;
        // base64("user:secret")
        Mock::given(method("GET"))
            .and(path("/v1/thing"))
            .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(Some(&format!("{}/v1/", server.uri())));
        let response = client.get("thing").unwrap().send().await.unwrap();
        assert_eq!(response.status(), 204);
    }

    #[tokio::test]
    async fn test_request_returns_error_statuses_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client(Some(&format!("{}/v1/", server.uri())));
        let response = client.get("thing").unwrap().send().await.unwrap();
        assert_eq!(response.status(), 500);
    }
}
