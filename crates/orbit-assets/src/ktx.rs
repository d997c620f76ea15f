// SPDX-License-Identifier: CEPL-1.0
//! KTX2 containers with a precomputed mip chain. Only uncompressed 8-bit
//! RGBA 2D textures are accepted; they upload without conversion.
use std::path::Path;

use ktx2::{Format, Reader};
use tracing::debug;

use crate::{AssetError, MipLevel, TextureData, TextureFormat};

fn texture_format(format: Option<Format>) -> Option<TextureFormat> {
    match format? {
        f if f == Format::R8G8B8A8_SRGB => Some(TextureFormat::Rgba8Srgb),
        f if f == Format::R8G8B8A8_UNORM => Some(TextureFormat::Rgba8Unorm),
        _ => None,
    }
}

pub(crate) fn decode(path: &Path, bytes: &[u8]) -> Result<TextureData, AssetError> {
    let unsupported = |reason: String| AssetError::UnsupportedKtx {
        path: path.to_path_buf(),
        reason,
    };

    let reader = Reader::new(bytes).map_err(|source| AssetError::Ktx {
        path: path.to_path_buf(),
        source,
    })?;
    let header = reader.header();

    let format = texture_format(header.format)
        .ok_or_else(|| unsupported(format!("pixel format {:?}", header.format)))?;
    if let Some(scheme) = header.supercompression_scheme {
        return Err(unsupported(format!("supercompression {scheme:?}")));
    }
    if header.layer_count > 1 || header.face_count != 1 || header.pixel_depth > 1 {
        return Err(unsupported(format!(
            "{} layers, {} faces, depth {}; only plain 2D textures load",
            header.layer_count, header.face_count, header.pixel_depth
        )));
    }

    let (width, height) = (header.pixel_width, header.pixel_height.max(1));
    let mut levels = Vec::new();
    let mut pixels = Vec::new();
    for (i, data) in reader.levels().enumerate() {
        let w = (width >> i).max(1);
        let h = (height >> i).max(1);
        let expected = w as usize * h as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(unsupported(format!(
                "level {i} ({w}x{h}) holds {} bytes, expected {expected}",
                data.len()
            )));
        }
        levels.push(MipLevel {
            width: w,
            height: h,
            offset: pixels.len(),
        });
        pixels.extend_from_slice(data);
    }

    debug!(
        "ktx2 {}: {width}x{height} {format:?}, {} mips",
        path.display(),
        levels.len()
    );
    Ok(TextureData {
        format,
        levels,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/checker4.ktx2")
    }

    const IDENTIFIER: [u8; 12] = [
        0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
    ];

    /// Minimal container without a data format descriptor: header, level
    /// index, then level data smallest first.
    fn container(vk_format: u32, width: u32, height: u32, levels: &[Vec<u8>]) -> Vec<u8> {
        let mut out = IDENTIFIER.to_vec();
        for v in [vk_format, 1, width, height, 0, 0, 1, levels.len() as u32, 0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        // dfd, kvd offsets/lengths, then sgd offset/length
        out.extend_from_slice(&[0; 16]);
        out.extend_from_slice(&[0; 16]);

        let mut offset = (out.len() + levels.len() * 24) as u64;
        let mut index = vec![[0u64; 3]; levels.len()];
        for (i, level) in levels.iter().enumerate().rev() {
            index[i] = [offset, level.len() as u64, level.len() as u64];
            offset += level.len() as u64;
        }
        for entry in &index {
            for v in entry {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        for level in levels.iter().rev() {
            out.extend_from_slice(level);
        }
        out
    }

    #[test]
    fn fixture_keeps_its_mip_chain() {
        let t = TextureData::load(fixture()).unwrap();
        assert_eq!(t.format, TextureFormat::Rgba8Srgb);
        let sizes: Vec<_> = t.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, [(4, 4), (2, 2), (1, 1)]);
        assert_eq!(t.pixels.len(), (16 + 4 + 1) * 4);

        assert_eq!(&t.level_bytes(0)[0..4], &[255, 0, 0, 255]);
        assert_eq!(&t.level_bytes(0)[8..12], &[255, 255, 255, 255]);
        assert_eq!(t.level_bytes(1), &[128; 16][..]);
        assert_eq!(t.level_bytes(2), &[64, 64, 64, 255]);
    }

    #[test]
    fn unorm_container_decodes() {
        let bytes = container(37, 2, 1, &[vec![1, 2, 3, 4, 5, 6, 7, 8], vec![9, 9, 9, 9]]);
        let t = decode(Path::new("lin.ktx2"), &bytes).unwrap();
        assert_eq!(t.format, TextureFormat::Rgba8Unorm);
        assert_eq!(t.mip_levels(), 2);
        assert_eq!(t.levels[1].offset, 8);
        assert_eq!(t.level_bytes(1), &[9, 9, 9, 9]);
    }

    #[test]
    fn compressed_formats_are_rejected() {
        // VK_FORMAT_BC1_RGB_SRGB_BLOCK
        let bytes = container(132, 4, 4, &[vec![0; 8]]);
        let err = decode(Path::new("bc1.ktx2"), &bytes).unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedKtx { .. }));
        assert!(err.to_string().contains("bc1.ktx2"));
    }

    #[test]
    fn short_level_is_rejected() {
        let bytes = container(43, 2, 2, &[vec![0; 12]]);
        let err = decode(Path::new("short.ktx2"), &bytes).unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedKtx { ref reason, .. } if reason.contains("level 0")));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = decode(Path::new("junk.ktx2"), b"definitely not ktx").unwrap_err();
        assert!(matches!(err, AssetError::Ktx { .. }));
    }

    #[test]
    fn missing_container_is_a_read_error() {
        let err = TextureData::load("does/not/exist.ktx2").unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
    }
}
