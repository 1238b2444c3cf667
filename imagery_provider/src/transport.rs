//! HTTP collaborator through which metadata, tiles and features are fetched.

use std::{future::Future, path::PathBuf};

use bytes::Bytes;
use http_cache_reqwest::{CACacheManager, Cache, CacheMode, HttpCache, HttpCacheOptions};
use reqwest::{Url, header::USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

pub use reqwest::header::HeaderValue;

/// Something which can fetch resources from the map servers.
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch and parse a JSON document, such as server's metadata.
    fn get_json(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<serde_json::Value, Self::Error>> + Send;

    /// Fetch raw bytes. Zero-length body is a valid response.
    fn get_bytes(&self, url: &Url) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;

    /// Fetch a tile image. Implementations which limit the number of requests in flight may
    /// return `None` to tell that the request should be made again later.
    fn request_image(
        &self,
        url: Url,
    ) -> Option<impl Future<Output = Result<Bytes, Self::Error>> + Send> {
        Some(async move { self.get_bytes(&url).await })
    }
}

/// Controls how [`HttpTransport`] uses the HTTP protocol, such as caching.
pub struct HttpOptions {
    /// Path to the directory to store the HTTP cache.
    ///
    /// Keep in mind that some providers require clients to respect the HTTP `Expires` header.
    pub cache: Option<PathBuf>,

    /// User agent to be sent to the servers.
    pub user_agent: Option<HeaderValue>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            cache: None,
            user_agent: Some(HeaderValue::from_static(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// [`Transport`] talking HTTP via `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    user_agent: Option<HeaderValue>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::with_options(HttpOptions::default())
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(http_options: HttpOptions) -> Self {
        Self {
            client: http_client(http_options.cache),
            user_agent: http_options.user_agent,
        }
    }

    async fn get(&self, url: &Url) -> Result<Bytes, HttpError> {
        let mut request = self.client.get(url.clone());
        if let Some(user_agent) = &self.user_agent {
            request = request.header(USER_AGENT, user_agent.clone());
        }

        let response = request.send().await?;
        log::debug!("Got {:?} from {url}.", response.status());

        Ok(response.error_for_status()?.bytes().await?)
    }
}

impl Transport for HttpTransport {
    type Error = HttpError;

    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, HttpError> {
        let bytes = self.get(url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_bytes(&self, url: &Url) -> Result<Bytes, HttpError> {
        self.get(url).await
    }
}

fn http_client(cache: Option<PathBuf>) -> ClientWithMiddleware {
    let builder = ClientBuilder::new(reqwest::Client::new());
    match cache {
        Some(path) => builder
            .with(Cache(HttpCache {
                mode: CacheMode::Default,
                manager: CACacheManager::new(path, false),
                options: HttpCacheOptions::default(),
            }))
            .build(),
        None => builder.build(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    pub struct MockError(pub String);

    #[derive(Default)]
    struct State {
        json: HashMap<String, serde_json::Value>,
        bytes: HashMap<String, Bytes>,
        requests: Vec<Url>,
        defer_images: bool,
    }

    /// [`Transport`] answering from canned responses, keyed by URL path. Every request is
    /// recorded, and paths without a canned response fail.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        state: Arc<Mutex<State>>,
    }

    impl MockTransport {
        pub fn with_json(self, path: &str, document: serde_json::Value) -> Self {
            self.state
                .lock()
                .unwrap()
                .json
                .insert(path.to_owned(), document);
            self
        }

        pub fn with_bytes(self, path: &str, bytes: impl Into<Bytes>) -> Self {
            self.state
                .lock()
                .unwrap()
                .bytes
                .insert(path.to_owned(), bytes.into());
            self
        }

        pub fn deferring_images(self) -> Self {
            self.state.lock().unwrap().defer_images = true;
            self
        }

        pub fn requests(&self) -> Vec<Url> {
            self.state.lock().unwrap().requests.clone()
        }

        fn respond<V: Clone>(
            &self,
            url: &Url,
            responses: impl FnOnce(&State) -> &HashMap<String, V>,
        ) -> Result<V, MockError> {
            let mut state = self.state.lock().unwrap();
            state.requests.push(url.clone());
            responses(&*state)
                .get(url.path())
                .cloned()
                .ok_or_else(|| MockError(format!("nothing at {}", url.path())))
        }
    }

    impl Transport for MockTransport {
        type Error = MockError;

        async fn get_json(&self, url: &Url) -> Result<serde_json::Value, MockError> {
            self.respond(url, |state| &state.json)
        }

        async fn get_bytes(&self, url: &Url) -> Result<Bytes, MockError> {
            self.respond(url, |state| &state.bytes)
        }

        fn request_image(
            &self,
            url: Url,
        ) -> Option<impl Future<Output = Result<Bytes, MockError>> + Send> {
            if self.state.lock().unwrap().defer_images {
                return None;
            }
            Some(async move { self.get_bytes(&url).await })
        }
    }

    #[tokio::test]
    async fn mock_records_requests() {
        let transport = MockTransport::default().with_bytes("/tile/0/0/0", vec![1, 2, 3]);
        let url = Url::parse("https://example.com/tile/0/0/0?token=abc").unwrap();

        let bytes = transport.request_image(url.clone()).unwrap().await.unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);

        assert!(transport.get_json(&url).await.is_err());
        assert_eq!(transport.requests(), vec![url.clone(), url]);
    }

    #[test]
    fn default_user_agent_names_the_crate() {
        assert_eq!(
            HttpOptions::default().user_agent,
            Some(HeaderValue::from_static(concat!(
                "imagery_provider/",
                env!("CARGO_PKG_VERSION")
            )))
        );
    }
}
