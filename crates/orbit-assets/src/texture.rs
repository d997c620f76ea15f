// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::{ktx, AssetError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit RGBA, sRGB-encoded color.
    Rgba8Srgb,
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8Srgb | TextureFormat::Rgba8Unorm => 4,
        }
    }
}

/// One level of the mip chain, located inside [`TextureData::pixels`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub offset: usize,
}

/// Tightly packed pixels for every mip level, largest first.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub format: TextureFormat,
    pub levels: Vec<MipLevel>,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// `.ktx2` containers keep their own format and mip chain; anything else
    /// is decoded by `image` into a single sRGB level.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let is_ktx2 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ktx2"));
        if is_ktx2 {
            let bytes = fs::read(path).map_err(|source| AssetError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            return ktx::decode(path, &bytes);
        }

        let img = image::open(path)
            .map_err(|source| AssetError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        debug!(
            "texture {}: {}x{}",
            path.display(),
            img.width(),
            img.height()
        );
        Self::from_rgba(img)
    }

    /// Two-color checkerboard used when no texture file is configured.
    pub fn checker(size: u32, cells: u32) -> Result<Self, AssetError> {
        let cell = (size / cells.max(1)).max(1);
        let img = RgbaImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Rgba([230, 230, 230, 255])
            } else {
                Rgba([40, 90, 200, 255])
            }
        });
        Self::from_rgba(img)
    }

    pub fn from_rgba(img: RgbaImage) -> Result<Self, AssetError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::EmptyTexture { width, height });
        }
        Ok(Self {
            format: TextureFormat::Rgba8Srgb,
            levels: vec![MipLevel {
                width,
                height,
                offset: 0,
            }],
            pixels: img.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn mip_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    #[cfg(test)]
    pub(crate) fn level_bytes(&self, level: usize) -> &[u8] {
        let l = self.levels[level];
        let len = l.width as usize * l.height as usize * self.format.bytes_per_pixel();
        &self.pixels[l.offset..l.offset + len]
    }

    /// Replaces any existing chain with a full one down to 1x1. Each level is
    /// a triangle-filtered half of the previous.
    pub fn generate_mips(&mut self) {
        let base_len = self.width() as usize * self.height() as usize * 4;
        let Some(mut current) =
            RgbaImage::from_raw(self.width(), self.height(), self.pixels[..base_len].to_vec())
        else {
            return;
        };

        let mut levels = vec![self.levels[0]];
        let mut pixels = current.as_raw().clone();
        while current.width() > 1 || current.height() > 1 {
            let w = (current.width() / 2).max(1);
            let h = (current.height() / 2).max(1);
            current = imageops::resize(&current, w, h, FilterType::Triangle);
            levels.push(MipLevel {
                width: w,
                height: h,
                offset: pixels.len(),
            });
            pixels.extend_from_slice(current.as_raw());
        }
        self.levels = levels;
        self.pixels = pixels;
    }
}
