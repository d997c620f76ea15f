// SPDX-License-Identifier: CEPL-1.0
//! CPU-side mesh and texture data, loaded from disk or generated.
mod error;
mod ktx;
mod mesh;
mod texture;

pub use error::AssetError;
pub use mesh::{MeshData, Vertex};
pub use texture::{MipLevel, TextureData, TextureFormat};
