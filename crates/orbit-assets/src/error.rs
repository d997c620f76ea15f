// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to load mesh {path}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("failed to load texture {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse KTX2 container {path}")]
    Ktx {
        path: PathBuf,
        #[source]
        source: ktx2::ParseError,
    },
    #[error("unsupported KTX2 texture {path}: {reason}")]
    UnsupportedKtx { path: PathBuf, reason: String },
    #[error("{path} has no triangles")]
    EmptyMesh { path: PathBuf },
    #[error("{path} has {count} vertices, 16-bit indices address at most 65536")]
    TooManyVertices { path: PathBuf, count: usize },
    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    EmptyTexture { width: u32, height: u32 },
}
