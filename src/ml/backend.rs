// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// Training runs on Autodiff<Wgpu> by default; NdArray is the
// pure-CPU fallback (and what the tests use). Use cases are
// generic over the backend and pick a concrete one here.

use std::{fmt, str::FromStr};

use anyhow::{bail, Result};
use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use serde::{Deserialize, Serialize};

pub type WgpuTrainBackend    = Autodiff<Wgpu>;
pub type NdArrayTrainBackend = Autodiff<NdArray>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Wgpu,
    NdArray,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wgpu"    => Ok(BackendKind::Wgpu),
            "ndarray" => Ok(BackendKind::NdArray),
            other     => bail!("unknown backend '{other}' (expected wgpu or ndarray)"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Wgpu    => write!(f, "wgpu"),
            BackendKind::NdArray => write!(f, "ndarray"),
        }
    }
}

/// Default GPU adapter, or the wgpu CPU adapter when `cpu` is set.
pub fn wgpu_device(cpu: bool) -> WgpuDevice {
    let device = if cpu { WgpuDevice::Cpu } else { WgpuDevice::default() };
    tracing::info!("Using WGPU device: {:?}", device);
    device
}

pub fn ndarray_device() -> NdArrayDevice {
    tracing::info!("Using NdArray CPU backend");
    NdArrayDevice::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend() {
        assert_eq!("WGPU".parse::<BackendKind>().unwrap(), BackendKind::Wgpu);
        assert_eq!("ndarray".parse::<BackendKind>().unwrap(), BackendKind::NdArray);
        assert!("cuda".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::NdArray.to_string(), "ndarray");
    }
}
