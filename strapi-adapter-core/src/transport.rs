//! HTTP implementation of [`Transport`] on top of `reqwest`.
//!
//! Credentials are handed in by the caller (the CLI reads them from the
//! environment); the rest of the core never sees them.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::contract::{RequestOptions, Transport};
use crate::error::{StandardResult, StrapiError};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer_token = (!token.is_empty()).then_some(token);
        self
    }

    fn resolve(&self, url: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> StandardResult<Value> {
        let target = self.resolve(url);
        tracing::debug!(%method, url = %target, tags = ?options.tags, "Sending request to Strapi");

        let mut request = self.client.request(method.clone(), &target);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = ?e, %method, url = %target, "Request to Strapi failed");
            StrapiError::transport(e.to_string(), e.status().map_or(500, |s| s.as_u16()))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(error = ?e, url = %target, "Failed to read Strapi response body");
            StrapiError::transport(e.to_string(), status.as_u16())
        })?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), %method, url = %target, body = %body, "Strapi returned an error status");
            return Err(StrapiError::transport(body, status.as_u16()));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = ?e, url = %target, "Strapi response is not valid JSON");
            StrapiError::transport(format!("Invalid JSON from Strapi: {e}"), 500)
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, options: &RequestOptions) -> StandardResult<Value> {
        self.send(Method::GET, url, None, options).await
    }

    async fn post(&self, url: &str, body: &Value, options: &RequestOptions) -> StandardResult<Value> {
        self.send(Method::POST, url, Some(body), options).await
    }

    async fn put(&self, url: &str, body: &Value, options: &RequestOptions) -> StandardResult<Value> {
        self.send(Method::PUT, url, Some(body), options).await
    }

    async fn delete(&self, url: &str, options: &RequestOptions) -> StandardResult<Value> {
        self.send(Method::DELETE, url, None, options).await
    }
}
