// ============================================================
// Layer 2 — InvokeUseCase (Inference Gateway)
// ============================================================
// Stateless request handler in front of a deployed endpoint:
//
//   image bytes → decode → re-encode as PNG
//               → invoke endpoint (application/x-image → application/json)
//               → parse body → take "class_name"
//               → 200 text/plain response with permissive CORS
//
// The endpoint may answer with a Python-style dict literal
// (`{'class_name': 'cat'}`), so single quotes are accepted as a
// fallback when strict JSON parsing fails. There is no retry;
// every failure surfaces as an error to the caller.

use anyhow::{anyhow, Context, Result};
use std::io::Cursor;
use image::ImageFormat;
use serde_json::Value;

use crate::domain::{prediction::GatewayResponse, traits::EndpointInvoker};

pub const REQUEST_CONTENT_TYPE: &str = "application/x-image";
pub const RESPONSE_ACCEPT:      &str = "application/json";

pub struct InvokeUseCase<I: EndpointInvoker> {
    invoker:       I,
    endpoint_name: String,
}

impl<I: EndpointInvoker> InvokeUseCase<I> {
    pub fn new(invoker: I, endpoint_name: impl Into<String>) -> Self {
        Self { invoker, endpoint_name: endpoint_name.into() }
    }

    pub async fn handle(&self, image_bytes: &[u8]) -> Result<GatewayResponse> {
        let png = to_png(image_bytes)?;

        let raw = self
            .invoker
            .invoke(&self.endpoint_name, REQUEST_CONTENT_TYPE, RESPONSE_ACCEPT, png)
            .await?;

        let text = String::from_utf8(raw).context("Endpoint response is not valid UTF-8")?;
        let class_name = parse_class_name(&text)?;
        tracing::info!("Endpoint '{}' answered '{}'", self.endpoint_name, class_name);

        Ok(GatewayResponse::ok(class_name))
    }
}

/// Decode any supported image format and re-encode it as PNG.
pub fn to_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("Cannot decode input image")?;
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .context("Cannot encode image as PNG")?;
    Ok(buf.into_inner())
}

/// Pull `class_name` out of an endpoint response body.
pub fn parse_class_name(body: &str) -> Result<String> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v)  => v,
        Err(_) => serde_json::from_str(&body.replace('\'', "\""))
            .with_context(|| format!("Endpoint response is not a dict: {body}"))?,
    };

    match value.get("class_name") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other)            => Ok(other.to_string()),
        None => Err(anyhow!("Endpoint response has no 'class_name': {body}")),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Returns a canned body and remembers what it was sent.
    struct FakeEndpoint {
        reply: Vec<u8>,
        seen:  Mutex<Vec<(String, String, String, Vec<u8>)>>,
    }

    impl FakeEndpoint {
        fn new(reply: &str) -> Self {
            Self { reply: reply.as_bytes().to_vec(), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl EndpointInvoker for FakeEndpoint {
        async fn invoke(
            &self,
            endpoint_name: &str,
            content_type:  &str,
            accept:        &str,
            body:          Vec<u8>,
        ) -> Result<Vec<u8>> {
            self.seen.lock().unwrap().push((
                endpoint_name.to_string(),
                content_type.to_string(),
                accept.to_string(),
                body,
            ));
            Ok(self.reply.clone())
        }
    }

    struct FailingEndpoint;

    #[async_trait]
    impl EndpointInvoker for FailingEndpoint {
        async fn invoke(&self, _: &str, _: &str, _: &str, _: Vec<u8>) -> Result<Vec<u8>> {
            Err(anyhow!("endpoint unavailable"))
        }
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(8, 6, |x, y| Rgb([x as u8 * 30, y as u8 * 40, 10]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_handle_returns_class_name() {
        let gateway  = InvokeUseCase::new(FakeEndpoint::new(r#"{"class_name": "cat"}"#), "my-endpoint");
        let response = gateway.handle(&jpeg_bytes()).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "cat");
        assert_eq!(response.headers["Content-Type"], "text/plain");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");

        let seen = gateway.invoker.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (name, content_type, accept, body) = &seen[0];
        assert_eq!(name, "my-endpoint");
        assert_eq!(content_type, "application/x-image");
        assert_eq!(accept, "application/json");
        assert_eq!(image::guess_format(body).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_handle_propagates_failures() {
        let gateway = InvokeUseCase::new(FailingEndpoint, "e");
        assert!(gateway.handle(&jpeg_bytes()).await.is_err());

        let gateway = InvokeUseCase::new(FakeEndpoint::new(r#"{"label": 1}"#), "e");
        assert!(gateway.handle(&jpeg_bytes()).await.is_err());

        let gateway = InvokeUseCase::new(FakeEndpoint::new(r#"{"class_name": "cat"}"#), "e");
        assert!(gateway.handle(b"definitely not an image").await.is_err());
    }

    #[test]
    fn test_parse_python_literal() {
        assert_eq!(parse_class_name("{'class_name': 'dog'}").unwrap(), "dog");
        assert_eq!(
            parse_class_name(r#"{"class_name": "bird", "confidence": 0.9}"#).unwrap(),
            "bird"
        );
        assert_eq!(parse_class_name(r#"{"class_name": 3}"#).unwrap(), "3");
        assert!(parse_class_name("not json").is_err());
    }
}
