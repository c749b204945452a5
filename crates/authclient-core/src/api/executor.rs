//! Transport primitive: sends one HTTP call, attaching the bearer credential
//! when the descriptor asks for it. No retries, no status interpretation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client};
use tracing::debug;

use super::{HttpResponse, RequestDescriptor, TransportError};
use crate::auth::SessionStore;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    base_url: Arc<str>,
    store: Arc<SessionStore>,
}

impl RequestExecutor {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        store: Arc<SessionStore>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, store))
    }

    /// Build on an existing client, sharing its connection pool
    pub fn with_client(client: Client, base_url: &str, store: Arc<SessionStore>) -> Self {
        Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            store,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send the request, reading the access token from the session store
    /// when the descriptor needs authentication.
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let session = self.store.read();
        let credential = if descriptor.needs_auth() {
            session.access_token()
        } else {
            None
        };
        self.send_with(descriptor, credential).await
    }

    /// Send the request with an already-resolved credential. A descriptor
    /// that needs auth but has no credential goes out unauthenticated.
    pub async fn send_with(
        &self,
        descriptor: &RequestDescriptor,
        credential: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(descriptor.path());
        let mut request = self
            .client
            .request(descriptor.method().clone(), &url)
            .header(header::ACCEPT, "application/json");

        match credential {
            Some(token) if descriptor.needs_auth() => request = request.bearer_auth(token),
            None if descriptor.needs_auth() => {
                debug!(path = descriptor.path(), "No access token, sending unauthenticated");
            }
            _ => {}
        }
        if let Some(body) = descriptor.body() {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(
            method = %descriptor.method(),
            path = descriptor.path(),
            status = status.as_u16(),
            "Request completed"
        );
        Ok(HttpResponse { status, body })
    }
}
