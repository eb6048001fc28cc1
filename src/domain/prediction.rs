// ============================================================
// Layer 3 — Prediction and Gateway Response Types
// ============================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The outcome of classifying a single image with a trained model.
///
/// Serialises to `{"class_name": ..., "class_index": ..., "confidence": ...}`;
/// the gateway only ever reads `class_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_name:  String,
    pub class_index: usize,
    pub confidence:  f32,
}

/// Minimal HTTP-style response returned by the inference gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers:     BTreeMap<String, String>,
    pub body:        String,
}

impl GatewayResponse {
    /// 200 response with a plain-text body readable from any origin
    pub fn ok(body: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        Self { status_code: 200, headers, body: body.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response_shape() {
        let resp = GatewayResponse::ok("cat");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["body"], "cat");
        assert_eq!(json["headers"]["Content-Type"], "text/plain");
        assert_eq!(json["headers"]["Access-Control-Allow-Origin"], "*");
    }
}
