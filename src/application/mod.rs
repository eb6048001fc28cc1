// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for each user-facing goal:
//
//   train_use_case   — fine-tune a ResNet on an image folder
//   predict_use_case — classify one image with a trained model
//   invoke_use_case  — the inference gateway: forward an image
//                      to a deployed endpoint, return its class
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing or printing here (that's Layer 1)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// Local single-image prediction
pub mod predict_use_case;

// The endpoint gateway
pub mod invoke_use_case;
