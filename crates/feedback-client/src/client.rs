use std::time::Duration;

use feedback_types::{CheckExistingResponse, FeedbackResponse, ResponsePatch, SubmitRequest, SubmitResponse};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ClientError;
use crate::retry::RetryTransport;
use crate::types::ClientConfig;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Fresh key for one logical submission.
pub fn new_idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

pub struct FeedbackClient {
    client: Client,
    transport: RetryTransport,
    config: ClientConfig,
}

impl FeedbackClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let transport = RetryTransport::new(client.clone(), config.retry.clone());
        Ok(Self { client, transport, config })
    }

    /// `POST /responses`. All attempts carry `idempotency_key`.
    pub async fn submit(
        &self,
        request: &SubmitRequest,
        idempotency_key: &str,
    ) -> Result<SubmitResponse, ClientError> {
        let builder = self
            .authorized(self.client.post(self.url("/responses")))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(request);
        self.send_json(builder).await
    }

    /// `GET /responses/check`.
    pub async fn check_existing(
        &self,
        element_id: &str,
        user_id: Option<&str>,
    ) -> Result<CheckExistingResponse, ClientError> {
        let mut query = vec![("elementId", element_id)];
        if let Some(user_id) = user_id {
            query.push(("userId", user_id));
        }
        let builder = self.authorized(self.client.get(self.url("/responses/check"))).query(&query);
        self.send_json(builder).await
    }

    /// `PATCH /responses/{id}`.
    pub async fn update(
        &self,
        id: Uuid,
        user_id: Option<&str>,
        patch: &ResponsePatch,
    ) -> Result<FeedbackResponse, ClientError> {
        let mut builder = self
            .authorized(self.client.patch(self.url(&format!("/responses/{}", id))))
            .json(patch);
        if let Some(user_id) = user_id {
            builder = builder.query(&[("userId", user_id)]);
        }
        self.send_json(builder).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.config.api_key))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response: Response = self.transport.send(builder.build()?).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
