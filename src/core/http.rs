use crate::utils::error::{CloudError, Result};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Maps a failed response to a domain error. Adapters with structured error
/// bodies supply their own.
pub type ErrorHandler = fn(StatusCode, &Method, &Url, String) -> CloudError;

/// Thin wrapper over `reqwest::Client` bound to one endpoint.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    endpoint: Url,
    error_handler: ErrorHandler,
}

impl RestClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("polycloud/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, endpoint)
    }

    pub fn with_client(client: Client, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| CloudError::InvalidConfigValueError {
            field: "provider.endpoint".to_string(),
            value: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            endpoint,
            error_handler: map_status_error,
        })
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    /// Same connection pool and error handler on another endpoint, e.g. one
    /// taken from a service catalog.
    pub fn rebase(&self, endpoint: &str) -> Result<Self> {
        Ok(Self::with_client(self.client.clone(), endpoint)?.with_error_handler(self.error_handler))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Resolves `path` under the endpoint, keeping any path the endpoint already has.
    /// Each `/`-separated segment is percent-encoded, so `?`, `#` and `%` stay
    /// part of the name. A trailing `/` is kept.
    pub fn url(&self, path: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::invalid_argument(format!("{} cannot carry a path", self.endpoint)))?
            .pop_if_empty()
            .extend(path.trim_start_matches('/').split('/'));
        Ok(url)
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self.client.request(method, self.url(path)?))
    }

    /// Builds and sends, translating non-success statuses.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build()?;
        self.send(request).await
    }

    /// Sends an already built request; used when a signer must see the final headers.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::trace!(%method, %url, "sending request");
        let response = self.client.execute(request).await?;
        let status = response.status();
        tracing::trace!(%method, %url, status = status.as_u16(), "received response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err((self.error_handler)(status, &method, &url, body))
    }
}

/// Default status translation shared by every adapter.
pub fn map_status_error(status: StatusCode, method: &Method, url: &Url, body: String) -> CloudError {
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no message").to_string()
    } else {
        body.trim().to_string()
    };
    match status.as_u16() {
        401 | 403 => CloudError::Unauthorized { message },
        404 => CloudError::ResourceNotFound {
            resource: format!("{} {}", method, url.path()),
        },
        409 => CloudError::IllegalState { message },
        412 => CloudError::PreconditionFailed { message },
        304 => CloudError::NotModified { message },
        code => CloudError::HttpResponse {
            status: code,
            method: method.to_string(),
            url: url.to_string(),
            message,
        },
    }
}

/// Fallbacks applied to calls where "not found" is an answer, not a failure.
pub trait FallbackExt<T> {
    fn or_none_on_not_found(self) -> Result<Option<T>>;

    /// `Ok(true)` on success, `Ok(false)` when the target was missing.
    fn or_false_on_not_found(self) -> Result<bool>;

    fn or_void_on_not_found(self) -> Result<()>;
}

impl<T> FallbackExt<T> for Result<T> {
    fn or_none_on_not_found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn or_false_on_not_found(self) -> Result<bool> {
        match self {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn or_void_on_not_found(self) -> Result<()> {
        match self {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_url_joins_under_endpoint_path() {
        let client = RestClient::new("http://localhost:8774/v2/tenant/").unwrap();
        assert_eq!(
            client.url("/servers/detail").unwrap().as_str(),
            "http://localhost:8774/v2/tenant/servers/detail"
        );
        let client = RestClient::new("http://localhost:8774").unwrap();
        assert_eq!(client.url("servers").unwrap().as_str(), "http://localhost:8774/servers");
        assert_eq!(client.url("dir/").unwrap().as_str(), "http://localhost:8774/dir/");
    }

    #[test]
    fn test_url_encodes_reserved_characters_in_names() {
        let client = RestClient::new("http://localhost/rest/namespace").unwrap();
        let url = client.url("c/report#1.txt").unwrap();
        assert_eq!(url.path(), "/rest/namespace/c/report%231.txt");
        assert_eq!(url.fragment(), None);

        let url = client.url("c/what?.txt").unwrap();
        assert_eq!(url.path(), "/rest/namespace/c/what%3F.txt");
        assert_eq!(url.query(), None);

        let url = client.url("c/100%.txt").unwrap();
        assert_eq!(url.path(), "/rest/namespace/c/100%25.txt");
    }

    #[test]
    fn test_status_mapping() {
        let url = Url::parse("http://x/y").unwrap();
        let err = map_status_error(StatusCode::UNAUTHORIZED, &Method::GET, &url, String::new());
        assert!(matches!(err, CloudError::Unauthorized { .. }));
        let err = map_status_error(StatusCode::NOT_FOUND, &Method::GET, &url, String::new());
        assert!(err.is_not_found());
        let err = map_status_error(StatusCode::CONFLICT, &Method::PUT, &url, "busy".into());
        assert!(matches!(err, CloudError::IllegalState { .. }));
        let err = map_status_error(StatusCode::BAD_GATEWAY, &Method::GET, &url, "oops".into());
        match err {
            CloudError::HttpResponse { status, message, .. } => {
                assert_eq!(status, 502);
                assert_eq!(message, "oops");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fallbacks() {
        let missing: Result<u8> = Err(CloudError::ResourceNotFound {
            resource: "r".into(),
        });
        assert_eq!(missing.or_none_on_not_found().unwrap(), None);

        let missing: Result<()> = Err(CloudError::ResourceNotFound {
            resource: "r".into(),
        });
        assert!(!missing.or_false_on_not_found().unwrap());

        let present: Result<()> = Ok(());
        assert!(present.or_false_on_not_found().unwrap());

        let other: Result<()> = Err(CloudError::illegal_state("x"));
        assert!(other.or_void_on_not_found().is_err());
    }

    #[tokio::test]
    async fn test_execute_translates_404() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let client = RestClient::new(&server.base_url()).unwrap();
        let result = client
            .execute(client.request(Method::GET, "missing").unwrap())
            .await;
        mock.assert();
        assert!(result.unwrap_err().is_not_found());
    }
}
