use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::ClientError;

/// One outbound call: method, path relative to the base URL, optional JSON
/// body, and whether a bearer credential must be attached.
///
/// Descriptors are immutable; a replay re-sends the same descriptor with a
/// freshly resolved credential.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    needs_auth: bool,
}

impl RequestDescriptor {
    /// Authenticated request with no body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            needs_auth: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Send without a bearer credential
    pub fn public(mut self) -> Self {
        self.needs_auth = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn needs_auth(&self) -> bool {
        self.needs_auth
    }
}

/// A completed HTTP exchange. Status codes are not interpreted here.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Turn any non-2xx response into `ClientError::Http`
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::http(self.status, self.body))
        }
    }

    /// Decode a successful JSON payload. Non-2xx responses and payloads
    /// that don't match `T` both become `ClientError::Http`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let response = self.error_for_status()?;
        serde_json::from_str(&response.body).map_err(|e| {
            tracing::warn!(error = %e, status = response.status.as_u16(), "Malformed response payload");
            ClientError::http(response.status, response.body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Greeting {
        message: String,
    }

    #[test]
    fn test_descriptor_defaults_to_authenticated() {
        let descriptor = RequestDescriptor::get("/me");
        assert!(descriptor.needs_auth());
        assert_eq!(descriptor.method(), &Method::GET);
        assert_eq!(descriptor.body(), None);
    }

    #[test]
    fn test_public_post_with_body() {
        let descriptor = RequestDescriptor::post("/login")
            .json(&serde_json::json!({ "email": "ada@example.com" }))
            .expect("serialize body")
            .public();

        assert!(!descriptor.needs_auth());
        assert_eq!(descriptor.path(), "/login");
        assert_eq!(
            descriptor.body().and_then(|b| b["email"].as_str()),
            Some("ada@example.com")
        );
    }

    #[test]
    fn test_json_decodes_success() {
        let response = HttpResponse::new(StatusCode::OK, r#"{"message":"sent"}"#);
        let greeting: Greeting = response.json().expect("decode");
        assert_eq!(greeting.message, "sent");
    }

    #[test]
    fn test_json_malformed_success_is_http_error() {
        let response = HttpResponse::new(StatusCode::OK, r#"{"unexpected":true}"#);
        let err = response.json::<Greeting>().expect_err("should fail");
        assert_eq!(err.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_error_for_status_keeps_body() {
        let response = HttpResponse::new(StatusCode::BAD_REQUEST, "bad email");
        match response.error_for_status() {
            Err(ClientError::Http { status, body }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "bad email");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
