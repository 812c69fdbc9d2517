//! Scan Core - Модуль поиска и декодирования кодов на изображениях
//!
//! Библиотека для обнаружения QR-кодов и линейных штрих-кодов:
//! - Декодирование через rxing с fallback на rqrr (только QR)
//! - Ground truth fallback по YOLO-аннотациям для штрих-кодов
//! - Объединение результатов в единый список записей
//! - Отрисовка рамок и сохранение результатов в CSV/JSON

pub mod annotations;
pub mod config;
pub mod decoding;
pub mod detection;
pub mod report;
pub mod visualization;

pub use annotations::{bbox_to_yolo, read_yolo_annotation, yolo_to_bbox, YoloBox};
pub use config::{AppConfig, ConfigError};
pub use decoding::{BarcodeDecoder, DecodeError, QrDecoder};
pub use detection::GroundTruthDetector;
pub use report::ReportError;
pub use visualization::Visualizer;

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Основные ошибки модуля
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Image load error: {0}")]
    ImageLoad(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image write error: {0}")]
    ImageWrite(#[from] image::ImageError),
}

/// Тип искомых кодов
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectionType {
    Qr,
    Barcode,
    Auto,
}

/// Вид найденного кода
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodeKind {
    Qr,
    Barcode,
}

impl CodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeKind::Qr => "qr",
            CodeKind::Barcode => "barcode",
        }
    }
}

/// Происхождение записи: декодер или файл аннотации
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Decoded,
    GroundTruth,
}

/// Единая запись результата для одного найденного кода
///
/// Имена полей при сериализации задают схему CSV/JSON выгрузки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Вид кода
    #[serde(rename = "type")]
    pub kind: CodeKind,
    /// Декодированный текст (отсутствует у ground truth записей)
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Формат штрих-кода (только для kind = barcode)
    #[serde(rename = "barcode_type", skip_serializing_if = "Option::is_none")]
    pub symbology: Option<String>,
    /// Bounding box [x, y, width, height] в пикселях
    pub bbox: [i32; 4],
    /// Контур найденного кода, как его сообщила библиотека
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub polygon: Vec<(i32, i32)>,
    /// Ориентация по данным библиотеки
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,
    /// Уверенность (фиксированная 1.0 для декодированных и ground truth)
    pub confidence: f32,
    /// Происхождение записи
    pub source: RecordSource,
    /// Класс из файла аннотации (только ground truth)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
    /// Имя файла изображения; заполняется на этапе объединения
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Полный путь к изображению; заполняется на этапе объединения
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Главный сканер: объединяет результаты адаптеров в итоговый список
pub struct CodeScanner {
    qr_decoder: QrDecoder,
    barcode_decoder: BarcodeDecoder,
    ground_truth: GroundTruthDetector,
}

impl CodeScanner {
    /// Создание сканера из конфигурации
    pub fn new(config: &AppConfig) -> Self {
        Self {
            qr_decoder: QrDecoder::new(config.qr_detection.use_fallback),
            barcode_decoder: BarcodeDecoder::new(),
            ground_truth: GroundTruthDetector::new(config.barcode_detection.use_annotations),
        }
    }

    /// Загрузка изображения и полный проход по нему
    pub fn scan_path(
        &self,
        image_path: &Path,
        detection_type: DetectionType,
    ) -> Result<Vec<DetectionRecord>, ScanError> {
        let image = image::open(image_path)
            .map_err(|e| ScanError::ImageLoad(format!("{}: {}", image_path.display(), e)))?;
        Ok(self.scan_image(&image, image_path, detection_type))
    }

    /// Обработка одного изображения: вызов адаптеров и объединение записей
    ///
    /// Ошибки адаптеров логируются и дают пустой результат от этого
    /// адаптера; второй адаптер при этом всё равно выполняется.
    pub fn scan_image(
        &self,
        image: &DynamicImage,
        image_path: &Path,
        detection_type: DetectionType,
    ) -> Vec<DetectionRecord> {
        let mut records = Vec::new();

        // 1. QR-коды
        if matches!(detection_type, DetectionType::Qr | DetectionType::Auto) {
            match self.qr_decoder.decode_image(image) {
                Ok(mut hits) => {
                    log::debug!("QR decoder: {} hits in {}", hits.len(), image_path.display());
                    records.append(&mut hits);
                }
                Err(e) => {
                    log::error!("QR decoding failed for {}: {}", image_path.display(), e);
                }
            }
        }

        // 2. Штрих-коды + ground truth fallback
        if matches!(detection_type, DetectionType::Barcode | DetectionType::Auto) {
            let decoded = match self.barcode_decoder.decode_image(image) {
                Ok(hits) => {
                    log::debug!(
                        "Barcode decoder: {} hits in {}",
                        hits.len(),
                        image_path.display()
                    );
                    hits
                }
                Err(e) => {
                    log::error!("Barcode decoding failed for {}: {}", image_path.display(), e);
                    Vec::new()
                }
            };

            if decoded.is_empty() {
                // Fallback только при полностью пустом результате декодера:
                // ground truth никогда не смешивается с декодированными хитами
                let mut fallback =
                    self.ground_truth
                        .detect(image_path, image.width(), image.height());
                records.append(&mut fallback);
            } else {
                records.extend(decoded);
            }
        }

        // 3. Метаданные - единственная мутация записи после создания
        let filename = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let file_path = image_path.to_string_lossy().into_owned();
        for record in &mut records {
            record.filename = filename.clone();
            record.file_path = Some(file_path.clone());
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> DetectionRecord {
        DetectionRecord {
            kind: CodeKind::Qr,
            payload: Some("HELLO".to_string()),
            symbology: None,
            bbox: [10, 10, 50, 50],
            polygon: vec![(10, 10), (60, 10), (60, 60), (10, 60)],
            orientation: None,
            confidence: 1.0,
            source: RecordSource::Decoded,
            class_id: None,
            filename: None,
            file_path: None,
        }
    }

    #[test]
    fn test_record_serialization_keys() {
        let value = serde_json::to_value(sample_record()).unwrap();
        let object = value.as_object().unwrap();

        // Сериализованные имена совпадают со схемой выгрузки
        assert_eq!(object["type"], "qr");
        assert_eq!(object["data"], "HELLO");
        assert_eq!(object["source"], "decoded");
        assert_eq!(object["bbox"], serde_json::json!([10, 10, 50, 50]));
        assert!(!object.contains_key("kind"));
        assert!(!object.contains_key("payload"));

        // None-поля не попадают в выгрузку
        assert!(!object.contains_key("barcode_type"));
        assert!(!object.contains_key("orientation"));
        assert!(!object.contains_key("filename"));
    }

    #[test]
    fn test_ground_truth_record_has_no_payload() {
        let record = DetectionRecord {
            kind: CodeKind::Barcode,
            payload: None,
            symbology: None,
            bbox: [80, 80, 40, 40],
            polygon: Vec::new(),
            orientation: None,
            confidence: 1.0,
            source: RecordSource::GroundTruth,
            class_id: Some(0),
            filename: None,
            file_path: None,
        };
        let value = serde_json::to_value(record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["source"], "ground_truth");
        assert!(!object.contains_key("data"));
        assert!(!object.contains_key("polygon"));
        assert_eq!(object["class_id"], 0);
    }

    #[test]
    fn test_code_kind_as_str() {
        assert_eq!(CodeKind::Qr.as_str(), "qr");
        assert_eq!(CodeKind::Barcode.as_str(), "barcode");
    }
}
