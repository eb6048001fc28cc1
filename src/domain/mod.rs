// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that describe what the system
// works with: the metadata persisted next to a trained model,
// the prediction a model produces, and the response the
// inference gateway hands back to its caller.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits

/// Metadata written next to the model weights (`model_info.pth`)
pub mod model_info;

/// Prediction and gateway response types
pub mod prediction;

/// Core abstractions (traits) that other layers implement
pub mod traits;
