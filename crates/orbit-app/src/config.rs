// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use orbit_render_vk::VkConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONFIG: &str = "orbit.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "orbit".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub msaa_samples: u32,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let vk = VkConfig::default();
        Self {
            clear_color: vk.clear_color,
            vsync: vk.vsync,
            msaa_samples: vk.msaa_samples,
        }
    }
}

impl From<RenderCfg> for VkConfig {
    fn from(cfg: RenderCfg) -> Self {
        VkConfig {
            clear_color: cfg.clear_color,
            vsync: cfg.vsync,
            msaa_samples: cfg.msaa_samples.max(1),
        }
    }
}

/// Asset paths. Unset means the built-in quad and checker texture.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AssetsCfg {
    pub mesh: Option<PathBuf>,
    pub texture: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub assets: AssetsCfg,
}

impl AppConfig {
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let cfg = Self::parse(path, &text)?;
                info!("config loaded from {}", path.display());
                Ok(cfg)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = AppConfig::parse(Path::new("orbit.toml"), "").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!((cfg.window.width, cfg.window.height), (1280, 720));
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.2, 1.0]);
        assert!(cfg.render.vsync);
        assert_eq!(cfg.render.msaa_samples, 4);
        assert!(cfg.assets.mesh.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let text = r#"
            [window]
            title = "viewer"

            [render]
            vsync = false

            [assets]
            mesh = "models/room.obj"
        "#;
        let cfg = AppConfig::parse(Path::new("orbit.toml"), text).unwrap();
        assert_eq!(cfg.window.title, "viewer");
        assert_eq!(cfg.window.width, 1280);
        assert!(!cfg.render.vsync);
        assert_eq!(cfg.render.msaa_samples, 4);
        assert_eq!(cfg.assets.mesh, Some(PathBuf::from("models/room.obj")));
        assert_eq!(cfg.assets.texture, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let err = AppConfig::parse(Path::new("bad.toml"), "[render]\nvsync = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("orbit-{}-absent.toml", std::process::id()));
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("orbit-{}-cfg.toml", std::process::id()));
        fs::write(&path, "[render]\nmsaa_samples = 8\n").unwrap();
        let cfg = AppConfig::load(&path);
        fs::remove_file(&path).ok();
        assert_eq!(cfg.unwrap().render.msaa_samples, 8);
    }

    #[test]
    fn zero_samples_become_one() {
        let vk: VkConfig = RenderCfg {
            msaa_samples: 0,
            ..RenderCfg::default()
        }
        .into();
        assert_eq!(vk.msaa_samples, 1);
    }
}
