//! HTTP client for the token/invoice authority.

use crate::domain::config::UpstreamConfig;
use crate::domain::{
    AccessToken, EnsurePdfRecord, GatewayError, SignatureRecord, ValidationRecord,
};
use crate::ports::{AuthorityError, InvoiceAuthority};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

/// reqwest implementation of [`InvoiceAuthority`].
#[derive(Clone)]
pub struct HttpInvoiceAuthority {
    client: Client,
    base_url: String,
}

impl HttpInvoiceAuthority {
    pub fn new(config: &UpstreamConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.authority_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.authority_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request keyed by `token`; non-success statuses are errors.
    async fn send(
        &self,
        request: RequestBuilder,
        token: &AccessToken,
    ) -> Result<Response, AuthorityError> {
        let response = request
            .query(&[("token", token.expose())])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Authority returned non-success status");
            return Err(AuthorityError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
    ) -> Result<T, AuthorityError> {
        let response = self.send(self.client.get(self.url(path)), token).await?;
        let body = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|e| AuthorityError::Malformed(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> AuthorityError {
    if e.is_timeout() {
        AuthorityError::Transport(format!("timed out: {e}"))
    } else {
        AuthorityError::Transport(e.to_string())
    }
}

#[async_trait]
impl InvoiceAuthority for HttpInvoiceAuthority {
    async fn validate_token(&self, token: &AccessToken) -> Result<ValidationRecord, AuthorityError> {
        self.get_json("validate", token).await
    }

    async fn ensure_pdf_current(
        &self,
        token: &AccessToken,
    ) -> Result<EnsurePdfRecord, AuthorityError> {
        self.get_json("ensure-pdf", token).await
    }

    async fn mark_viewed(&self, token: &AccessToken) -> Result<(), AuthorityError> {
        self.send(self.client.post(self.url("viewed")), token)
            .await
            .map(|_| ())
    }

    async fn submit_signature(
        &self,
        token: &AccessToken,
        signature: &SignatureRecord,
    ) -> Result<(), AuthorityError> {
        self.send(self.client.post(self.url("signature")).json(signature), token)
            .await
            .map(|_| ())
    }
}
