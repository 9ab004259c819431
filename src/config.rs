// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 应用配置 - 通过JSON文件调整参数
//!
//! 文件不存在时写出默认配置; 解析失败时警告并使用默认值.
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::detection::LabelMap;
use crate::error::ConfigError;
use crate::frame::Region;
use crate::input::CaptureConfig;
use crate::models::ModelConfig;
use crate::overlay::OverlayStyle;

/// 默认刷新间隔 (毫秒)
pub const DEFAULT_REFRESH_MS: u64 = 2000;

/// 窗口参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Screen Sentinel".to_string(),
            width: 500,
            height: 500,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    /// 呈现区域 (窗口客户区坐标), None 为整个客户区
    pub target: Option<Region>,
    pub refresh_interval_ms: u64,
    pub model: ModelConfig,
    pub overlay: OverlayStyle,
    pub window: WindowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            target: None,
            refresh_interval_ms: DEFAULT_REFRESH_MS,
            model: ModelConfig::default(),
            overlay: OverlayStyle::default(),
            window: WindowConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从JSON文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在, 创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    error!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 启动前的一致性检查
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::EmptyRegion {
                width: self.window.width,
                height: self.window.height,
            });
        }
        LabelMap::from_set(&self.model.labels, self.model.num_classes)?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️ 当前配置:");
        info!(
            "  输入源: {:?} 区域 {}",
            self.capture.source, self.capture.region
        );
        match self.target {
            Some(target) => info!("  呈现区域: {}", target),
            None => info!("  呈现区域: 整个客户区"),
        }
        info!("  刷新间隔: {}ms", self.refresh_interval_ms);
        info!(
            "  模型: {} (失败策略 {:?})",
            self.model.kind.name(),
            self.model.on_error
        );
        info!(
            "  窗口: {} {}x{}",
            self.window.title, self.window.width, self.window.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::LabelSet;
    use crate::input::SourceKind;
    use crate::models::{FailurePolicy, ModelKind};

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.json");
        let config = AppConfig::load(&path);
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(AppConfig::load(&path), config);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }

    #[test]
    fn test_zero_region_in_file_is_rejected() {
        let json = r#"{"capture":{"region":{"x":0,"y":0,"width":0,"height":10}}}"#;
        assert!(AppConfig::from_json(json).is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let json = r#"{
            "refresh_interval_ms": 250,
            "capture": {"source": "pattern", "region": {"x":10,"y":10,"width":100,"height":50}},
            "model": {"kind": "luma", "on_error": "abandon"}
        }"#;
        let config = AppConfig::from_json(json).unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_millis(250));
        assert_eq!(config.capture.source, SourceKind::Pattern);
        assert_eq!(config.capture.region, Region::new(10, 10, 100, 50).unwrap());
        assert_eq!(config.model.kind, ModelKind::Luma);
        assert_eq!(config.model.on_error, FailurePolicy::Abandon);
        assert_eq!(config.window, WindowConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig {
            refresh_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroInterval)));

        config.refresh_interval_ms = 100;
        config.model.labels = LabelSet::Custom(vec!["a".into(), "b".into()]);
        config.model.num_classes = Some(3);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LabelCount { .. })
        ));
    }
}
