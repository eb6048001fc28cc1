// ============================================================
// Layer 6 — SageMaker Runtime Client
// ============================================================
// `EndpointInvoker` backed by the SageMaker runtime
// InvokeEndpoint API. Credentials and region come from the
// ambient AWS environment (env vars, profile, instance role)
// through aws-config.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sagemakerruntime::{primitives::Blob, Client};

use crate::domain::traits::EndpointInvoker;

pub struct SageMakerInvoker {
    client: Client,
}

impl SageMakerInvoker {
    /// Build a client from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self { client: Client::new(&config) }
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointInvoker for SageMakerInvoker {
    async fn invoke(
        &self,
        endpoint_name: &str,
        content_type:  &str,
        accept:        &str,
        body:          Vec<u8>,
    ) -> Result<Vec<u8>> {
        tracing::debug!(
            "Invoking endpoint '{}' with {} bytes ({})",
            endpoint_name,
            body.len(),
            content_type
        );

        let out = self
            .client
            .invoke_endpoint()
            .endpoint_name(endpoint_name)
            .content_type(content_type)
            .accept(accept)
            .body(Blob::new(body))
            .send()
            .await
            .with_context(|| format!("InvokeEndpoint failed for '{endpoint_name}'"))?;

        Ok(out.body().map(|b| b.as_ref().to_vec()).unwrap_or_default())
    }
}
