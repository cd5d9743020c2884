//! Wire transports for the inference client.
//!
//! [`HttpTransport`] wraps one pooled `reqwest::blocking::Client`, which is
//! `Send + Sync`: a single transport may serve concurrent requests from
//! many threads, each one an independent HTTP exchange.

use std::sync::Arc;
use std::time::Duration;

use crate::error::InferError;
use crate::protocol::{InferRequest, InferResponse, ModelMetadata};

/// One round trip per call, no retries.
pub trait InferenceTransport: Send + Sync {
    fn server_ready(&self) -> Result<bool, InferError>;

    fn model_ready(&self, model: &str, version: &str) -> Result<bool, InferError>;

    fn model_metadata(&self, model: &str, version: &str) -> Result<ModelMetadata, InferError>;

    fn infer(
        &self,
        model: &str,
        version: &str,
        request: &InferRequest,
    ) -> Result<InferResponse, InferError>;
}

impl<T: InferenceTransport + ?Sized> InferenceTransport for Arc<T> {
    fn server_ready(&self) -> Result<bool, InferError> {
        (**self).server_ready()
    }

    fn model_ready(&self, model: &str, version: &str) -> Result<bool, InferError> {
        (**self).model_ready(model, version)
    }

    fn model_metadata(&self, model: &str, version: &str) -> Result<ModelMetadata, InferError> {
        (**self).model_metadata(model, version)
    }

    fn infer(
        &self,
        model: &str,
        version: &str,
        request: &InferRequest,
    ) -> Result<InferResponse, InferError> {
        (**self).infer(model, version, request)
    }
}

/// KServe v2 REST transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, InferError> {
        let mut base_url: String = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        if base_url.is_empty() {
            return Err(InferError::InvalidRequest("inference endpoint URL is empty".into()));
        }
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url,
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn model_url(&self, model: &str, version: &str) -> String {
        if version.is_empty() {
            format!("{}/v2/models/{model}", self.base_url)
        } else {
            format!("{}/v2/models/{model}/versions/{version}", self.base_url)
        }
    }

    fn check_ready(&self, url: &str) -> Result<bool, InferError> {
        let response = self.client.get(url).send()?;
        log::trace!("GET {url} -> {}", response.status());
        Ok(response.status().is_success())
    }

    fn checked(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, InferError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_else(|_| String::from("<unreadable body>"));
        Err(InferError::Protocol(format!("server returned {status}: {}", body.trim())))
    }
}

impl InferenceTransport for HttpTransport {
    fn server_ready(&self) -> Result<bool, InferError> {
        self.check_ready(&format!("{}/v2/health/ready", self.base_url))
    }

    fn model_ready(&self, model: &str, version: &str) -> Result<bool, InferError> {
        self.check_ready(&format!("{}/ready", self.model_url(model, version)))
    }

    fn model_metadata(&self, model: &str, version: &str) -> Result<ModelMetadata, InferError> {
        let response = Self::checked(self.client.get(self.model_url(model, version)).send()?)?;
        response
            .json()
            .map_err(|e| InferError::Protocol(format!("malformed metadata for `{model}`: {e}")))
    }

    fn infer(
        &self,
        model: &str,
        version: &str,
        request: &InferRequest,
    ) -> Result<InferResponse, InferError> {
        let url = format!("{}/infer", self.model_url(model, version));
        log::debug!("POST {url} ({} inputs)", request.inputs.len());
        let response = Self::checked(self.client.post(&url).json(request).send()?)?;
        response
            .json()
            .map_err(|e| InferError::Protocol(format!("malformed response from `{model}`: {e}")))
    }
}
