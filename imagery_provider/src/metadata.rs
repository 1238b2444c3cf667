//! Fetching of the service metadata. Documents are shared between all providers in the process,
//! so that creating many providers for the same service results in a single request.

use std::{
    num::NonZeroUsize,
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use lru::LruCache;
use reqwest::Url;
use serde_json::Value;

use crate::{Error, ErrorEvent, builder::ProviderBuilder, transport::Transport};

type Document = Shared<BoxFuture<'static, Result<Arc<Value>, Error>>>;

/// Number of services whose metadata is kept.
const CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(255);

/// Metadata requests, both pending and completed, keyed by the full URL.
static METADATA: LazyLock<Mutex<LruCache<String, Document>>> =
    LazyLock::new(|| Mutex::new(LruCache::new(CAPACITY)));

/// Fetch the metadata document, or join the request which is already in flight. Failed
/// requests are forgotten, so that the next call tries again.
pub(crate) async fn fetch<T>(transport: &T, url: &Url) -> Result<Arc<Value>, Error>
where
    T: Transport + Clone + 'static,
{
    let key = url.as_str().to_owned();

    let document = {
        let mut cache = METADATA.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(document) = cache.get(&key) {
            log::debug!("Reusing metadata request for {key}.");
            document.clone()
        } else {
            let document = request(transport.clone(), url.clone()).boxed().shared();
            cache.put(key.clone(), document.clone());
            document
        }
    };

    let result = document.clone().await;

    if result.is_err() {
        let mut cache = METADATA.lock().unwrap_or_else(PoisonError::into_inner);
        if cache
            .peek(&key)
            .is_some_and(|cached| cached.ptr_eq(&document))
        {
            cache.pop(&key);
        }
    }

    result
}

async fn request<T: Transport>(transport: T, url: Url) -> Result<Arc<Value>, Error> {
    log::debug!("Requesting metadata from {url}.");
    transport
        .get_json(&url)
        .await
        .map(Arc::new)
        .map_err(|err| Error::transport(&url, err))
}

/// Fetch the metadata from the `endpoint` and let `parse` apply it onto the `builder`. Failures
/// are raised on the `errors` event before being returned.
pub(crate) async fn resolve<T, F>(
    transport: &T,
    endpoint: &Url,
    errors: &ErrorEvent,
    builder: ProviderBuilder,
    parse: F,
) -> Result<ProviderBuilder, Error>
where
    T: Transport + Clone + 'static,
    F: FnOnce(&Value, ProviderBuilder) -> Result<ProviderBuilder, Error>,
{
    let result = match fetch(transport, endpoint).await {
        Ok(document) => parse(&document, builder),
        Err(err) => Err(err),
    };

    result.map_err(|err| errors.report(endpoint.as_str(), None, err))
}
