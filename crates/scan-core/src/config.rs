//! Конфигурация приложения
//!
//! Настройки загружаются один раз из YAML-файла и передаются компонентам
//! при создании. Отсутствие файла - фатальная ошибка запуска.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ошибки загрузки конфигурации
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Настройки приложения
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub qr_detection: QrDetectionConfig,
    pub barcode_detection: BarcodeDetectionConfig,
    pub visualization: VisualizationConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Загрузка конфигурации из YAML-файла
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

/// Настройки поиска QR-кодов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrDetectionConfig {
    /// Пробовать rqrr, если rxing ничего не нашёл
    pub use_fallback: bool,
}

impl Default for QrDetectionConfig {
    fn default() -> Self {
        Self { use_fallback: true }
    }
}

/// Настройки поиска штрих-кодов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeDetectionConfig {
    /// Использовать YOLO-аннотации как ground truth fallback
    pub use_annotations: bool,
}

impl Default for BarcodeDetectionConfig {
    fn default() -> Self {
        Self {
            use_annotations: true,
        }
    }
}

/// Настройки отрисовки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Цвет рамки (RGB)
    pub box_color: [u8; 3],
    /// Толщина рамки в пикселях
    pub box_thickness: u32,
    /// Масштаб шрифта подписи
    pub font_scale: f32,
    /// Путь к TTF-шрифту; без него подписи не рисуются
    pub font_path: Option<String>,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            box_thickness: 2,
            font_scale: 0.6,
            font_path: None,
        }
    }
}

/// Настройки логирования
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень логирования по умолчанию (info, debug, ...)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_takes_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.qr_detection.use_fallback);
        assert!(config.barcode_detection.use_annotations);
        assert_eq!(config.visualization.box_color, [0, 255, 0]);
        assert_eq!(config.visualization.box_thickness, 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_overrides() {
        let raw = "
barcode_detection:
  use_annotations: false
visualization:
  box_color: [255, 0, 0]
  box_thickness: 3
logging:
  level: debug
";
        let config: AppConfig = serde_yaml::from_str(raw).unwrap();
        assert!(!config.barcode_detection.use_annotations);
        assert_eq!(config.visualization.box_color, [255, 0, 0]);
        assert_eq!(config.visualization.box_thickness, 3);
        // Не заданные секции остаются дефолтными
        assert!(config.qr_detection.use_fallback);
        assert!((config.visualization.font_scale - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load(Path::new("no/such/config.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "qr_detection:\n  use_fallback: false\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(!config.qr_detection.use_fallback);
    }
}
