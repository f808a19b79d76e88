//! Request gateway: the single seam between workflows and the backend.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::protocol::HealthResponse;
use tracing::debug;
use url::Url;

use crate::{error::GatewayError, upload::UploadFile};

pub const MULTIPART_FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Json(Value),
    Multipart(UploadFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub endpoint: String,
    pub method: Method,
    pub payload: Payload,
}

impl GatewayRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Get,
            payload: Payload::None,
        }
    }

    pub fn post_json<T: Serialize>(
        endpoint: impl Into<String>,
        body: &T,
    ) -> Result<Self, GatewayError> {
        let body = serde_json::to_value(body)
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            method: Method::Post,
            payload: Payload::Json(body),
        })
    }

    pub fn post_file(endpoint: impl Into<String>, file: UploadFile) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Post,
            payload: Payload::Multipart(file),
        }
    }

    /// JSON body of the request, if any.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(body) => Some(body),
            _ => None,
        }
    }
}

/// One request, one attempt. Implementations never retry.
#[async_trait]
pub trait RequestGateway: Send + Sync {
    async fn call(&self, request: GatewayRequest) -> Result<Value, GatewayError>;
}

/// Issues `request` and decodes the JSON response into `T`.
pub async fn call_json<T: DeserializeOwned>(
    gateway: &dyn RequestGateway,
    request: GatewayRequest,
) -> Result<T, GatewayError> {
    let value = gateway.call(request).await?;
    serde_json::from_value(value).map_err(|err| GatewayError::DecodeFailure(err.to_string()))
}

pub struct HttpGateway {
    http: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub async fn health(&self) -> Result<HealthResponse, GatewayError> {
        call_json(self, GatewayRequest::get("/health")).await
    }
}

#[async_trait]
impl RequestGateway for HttpGateway {
    async fn call(&self, request: GatewayRequest) -> Result<Value, GatewayError> {
        let url = self.url_for(&request.endpoint);
        let builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        let builder = match request.payload {
            Payload::None => builder,
            Payload::Json(body) => builder.json(&body),
            Payload::Multipart(file) => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.filename)
                    .mime_str(&file.mime_type)
                    .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
                builder.multipart(Form::new().part(MULTIPART_FILE_FIELD, part))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|err| GatewayError::NetworkFailure(err.to_string()))?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "backend responded");
        if !status.is_success() {
            return Err(GatewayError::HttpFailure {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| GatewayError::NetworkFailure(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| GatewayError::DecodeFailure(err.to_string()))
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
