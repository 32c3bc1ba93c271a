//! Real HTTP transport backed by reqwest

use async_trait::async_trait;
use std::time::Duration;

use crate::config::USER_AGENT;
use crate::error::{StackError, StackResult};
use crate::traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Real HTTP client implementation
#[derive(Debug, Clone)]
pub struct RealHttpClient {
    client: reqwest::Client,
}

impl RealHttpClient {
    pub fn new() -> StackResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StackError::config(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for RealHttpClient {
    async fn send(&self, request: HttpRequest) -> StackResult<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StackError::network(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| StackError::network(&request.url, e))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
