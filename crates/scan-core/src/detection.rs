//! Модуль детекции штрих-кодов по ground truth аннотациям
//!
//! Используется как fallback, когда декодер штрих-кодов ничего не нашёл.
//! Аннотации несут только геометрию: записи не содержат payload.

use std::path::Path;

use crate::annotations::{read_yolo_annotation, yolo_to_bbox};
use crate::{CodeKind, DetectionRecord, RecordSource};

/// Расширение файла аннотации рядом с изображением
const ANNOTATION_EXTENSION: &str = "txt";

/// Детектор по YOLO-аннотациям
pub struct GroundTruthDetector {
    /// Включён ли fallback на аннотации
    enabled: bool,
}

impl GroundTruthDetector {
    /// Создание детектора
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Детекция по файлу аннотации с тем же именем, что и изображение
    ///
    /// Возвращает пустой список, если fallback выключен или файла нет.
    pub fn detect(
        &self,
        image_path: &Path,
        image_width: u32,
        image_height: u32,
    ) -> Vec<DetectionRecord> {
        if !self.enabled {
            return Vec::new();
        }

        let annotation_path = image_path.with_extension(ANNOTATION_EXTENSION);
        if !annotation_path.exists() {
            return Vec::new();
        }

        let boxes = read_yolo_annotation(&annotation_path);
        log::debug!(
            "Ground truth: {} boxes from {}",
            boxes.len(),
            annotation_path.display()
        );

        boxes
            .into_iter()
            .map(|b| DetectionRecord {
                kind: CodeKind::Barcode,
                payload: None,
                symbology: None,
                bbox: yolo_to_bbox(
                    b.center_x,
                    b.center_y,
                    b.width,
                    b.height,
                    image_width,
                    image_height,
                ),
                polygon: Vec::new(),
                orientation: None,
                confidence: 1.0,
                source: RecordSource::GroundTruth,
                class_id: Some(b.class_id),
                filename: None,
                file_path: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_annotation(dir: &Path, stem: &str, content: &str) -> std::path::PathBuf {
        let image_path = dir.join(format!("{stem}.png"));
        let mut file = std::fs::File::create(dir.join(format!("{stem}.txt"))).unwrap();
        write!(file, "{content}").unwrap();
        image_path
    }

    #[test]
    fn test_disabled_detector_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_annotation(dir.path(), "sample", "0 0.5 0.5 0.2 0.2\n");

        let detector = GroundTruthDetector::new(false);
        assert!(detector.detect(&image_path, 200, 200).is_empty());
    }

    #[test]
    fn test_missing_annotation_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("no_annotation.png");

        let detector = GroundTruthDetector::new(true);
        assert!(detector.detect(&image_path, 200, 200).is_empty());
    }

    #[test]
    fn test_annotation_converted_to_records() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_annotation(
            dir.path(),
            "sample_barcode",
            "0 0.5 0.5 0.2 0.2\n1 0.25 0.25 0.1 0.1\n",
        );

        let detector = GroundTruthDetector::new(true);
        let records = detector.detect(&image_path, 200, 200);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bbox, [80, 80, 40, 40]);
        assert_eq!(records[0].kind, CodeKind::Barcode);
        assert_eq!(records[0].source, RecordSource::GroundTruth);
        assert_eq!(records[0].class_id, Some(0));
        assert!(records[0].payload.is_none());
        assert!((records[0].confidence - 1.0).abs() < f32::EPSILON);

        assert_eq!(records[1].bbox, [40, 40, 20, 20]);
        assert_eq!(records[1].class_id, Some(1));
    }
}
