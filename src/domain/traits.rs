// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The gateway talks to a remote model-serving endpoint through
// this trait so the use case can be exercised with an in-memory
// fake instead of a live SageMaker endpoint.
//
// Implementations:
//   - SageMakerInvoker (infra) → aws-sdk-sagemakerruntime
//   - test doubles             → canned responses

use anyhow::Result;
use async_trait::async_trait;

// ─── EndpointInvoker ──────────────────────────────────────────────────────────
/// Anything that can send a payload to a named inference endpoint
/// and return the raw response body.
#[async_trait]
pub trait EndpointInvoker: Send + Sync {
    async fn invoke(
        &self,
        endpoint_name: &str,
        content_type:  &str,
        accept:        &str,
        body:          Vec<u8>,
    ) -> Result<Vec<u8>>;
}
