use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, InvalidHeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// CKAN expects the raw key in `Authorization`, without a `Bearer` prefix.
pub struct ApiKey<C> {
    pub inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    /// Fails if `key` contains characters not allowed in a header value.
    pub fn new(inner: C, header_name: HeaderName, key: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(key)?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// Sends `key` verbatim in the `Authorization` header.
    pub fn authorization(inner: C, key: &str) -> Result<Self, InvalidHeaderValue> {
        Self::new(inner, reqwest::header::AUTHORIZATION, key)
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    #[test]
    fn test_rejects_key_with_newline() {
        assert!(ApiKey::authorization(BasicClient::new(), "abc\ndef").is_err());
    }

    #[test]
    fn test_value_is_marked_sensitive() {
        let client = ApiKey::authorization(BasicClient::new(), "secret-key").unwrap();
        assert!(client.value.is_sensitive());
        assert_eq!(client.header_name, reqwest::header::AUTHORIZATION);
    }
}
