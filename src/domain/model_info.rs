// ============================================================
// Layer 3 — ModelInfo Domain Type
// ============================================================
// The small metadata record persisted as `model_info.pth`.
// Whoever loads `model.pth` needs it to rebuild the exact
// architecture before the weights can be restored.
//
// `n_classes` is the one key every consumer relies on; the rest
// describe the backbone and the eval-time input so the model
// can be reconstructed without the original CLI arguments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Output dimension of the replacement classification layer
    pub n_classes: usize,

    /// ResNet depth (18, 34, 50, 101 or 152)
    #[serde(default = "default_depth")]
    pub depth: usize,

    /// Channel width of the first stage (64 for torchvision models)
    #[serde(default = "default_base_width")]
    pub base_width: usize,

    /// Side length of the square crops fed to the network
    #[serde(default = "default_input_size")]
    pub img_input_size: u32,

    /// Class names in label order (sorted training subfolders)
    #[serde(default)]
    pub class_names: Vec<String>,
}

fn default_depth() -> usize { 50 }
fn default_base_width() -> usize { 64 }
fn default_input_size() -> u32 { 224 }

impl ModelInfo {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            depth:          default_depth(),
            base_width:     default_base_width(),
            img_input_size: default_input_size(),
            class_names:    Vec::new(),
        }
    }

    /// Name for a label index, falling back to the index itself
    /// when the model was saved without class names.
    pub fn class_name(&self, index: usize) -> String {
        self.class_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_uses_defaults() {
        // A record carrying only the class count must still load
        let info: ModelInfo = serde_json::from_str(r#"{"n_classes": 3}"#).unwrap();
        assert_eq!(info.n_classes, 3);
        assert_eq!(info.depth, 50);
        assert_eq!(info.base_width, 64);
        assert_eq!(info.img_input_size, 224);
        assert!(info.class_names.is_empty());
    }

    #[test]
    fn test_class_name_fallback() {
        let mut info = ModelInfo::new(2);
        assert_eq!(info.class_name(1), "1");
        info.class_names = vec!["cat".into(), "dog".into()];
        assert_eq!(info.class_name(1), "dog");
    }
}
