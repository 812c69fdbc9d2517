//! Модуль декодирования QR-кодов и штрих-кодов
//!
//! Использует rxing как основной декодер; для QR есть fallback на rqrr.
//! Оба адаптера приводят результаты библиотек к общему виду
//! [`DetectionRecord`].

use std::collections::HashSet;

use image::{DynamicImage, GrayImage};
use rxing::common::HybridBinarizer;
use rxing::multi::{GenericMultipleBarcodeReader, MultipleBarcodeReader};
use rxing::{
    BarcodeFormat, BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary,
    Exceptions, Luma8LuminanceSource, MultiFormatReader, RXingResult, RXingResultMetadataType,
    RXingResultMetadataValue, ResultPoint,
};
use thiserror::Error;

use crate::{CodeKind, DetectionRecord, RecordSource};

/// Ошибки декодирования
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Decoder library error: {0}")]
    Library(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

/// Декодер QR-кодов
///
/// rxing ограничен символикой QR через POSSIBLE_FORMATS, поэтому фильтрация
/// результатов ниже по конвейеру не нужна.
pub struct QrDecoder {
    /// Пробовать rqrr, если rxing ничего не нашёл
    use_fallback: bool,
}

impl QrDecoder {
    /// Создание декодера
    pub fn new(use_fallback: bool) -> Self {
        Self { use_fallback }
    }

    /// Декодирование всех QR-кодов на изображении
    pub fn decode_image(&self, image: &DynamicImage) -> Result<Vec<DetectionRecord>, DecodeError> {
        let gray = image.to_luma8();

        let records = self.decode_with_rxing(&gray)?;
        if !records.is_empty() || !self.use_fallback {
            return Ok(records);
        }

        log::debug!("RXING: no QR hits, trying rqrr fallback");
        Ok(self.decode_with_rqrr(&gray))
    }

    /// Декодирование через rxing (только QR)
    fn decode_with_rxing(&self, gray: &GrayImage) -> Result<Vec<DetectionRecord>, DecodeError> {
        let (width, height) = gray.dimensions();
        let source = Luma8LuminanceSource::new(gray.as_raw().clone(), width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));

        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(HashSet::from([BarcodeFormat::QR_CODE])),
        );
        hints.insert(
            DecodeHintType::TRY_HARDER,
            DecodeHintValue::TryHarder(true),
        );

        let mut reader = GenericMultipleBarcodeReader::new(MultiFormatReader::default());
        match reader.decode_multiple_with_hints(&mut bitmap, &hints) {
            Ok(results) => Ok(results
                .iter()
                .map(|result| record_from_result(result, CodeKind::Qr))
                .collect()),
            Err(Exceptions::NotFoundException(_)) => Ok(Vec::new()),
            Err(e) => Err(DecodeError::Library(e.to_string())),
        }
    }

    /// Декодирование через rqrr (fallback)
    fn decode_with_rqrr(&self, gray: &GrayImage) -> Vec<DetectionRecord> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();
        log::debug!("RQRR: detected {} grids", grids.len());

        let mut records = Vec::new();
        for grid in &grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let polygon: Vec<(i32, i32)> = grid
                        .bounds
                        .iter()
                        .map(|p| (p.x as i32, p.y as i32))
                        .collect();
                    records.push(DetectionRecord {
                        kind: CodeKind::Qr,
                        payload: Some(content),
                        symbology: None,
                        bbox: bounding_rect(&polygon),
                        polygon,
                        orientation: None,
                        confidence: 1.0,
                        source: RecordSource::Decoded,
                        class_id: None,
                        filename: None,
                        file_path: None,
                    });
                }
                Err(e) => {
                    log::debug!("RQRR: grid decode failed: {:?}", e);
                }
            }
        }
        records
    }
}

/// Декодер линейных штрих-кодов
///
/// Вызывает rxing без ограничения форматов и отбрасывает QR-коды: они
/// принадлежат [`QrDecoder`], иначе один объект попадёт в выгрузку дважды.
pub struct BarcodeDecoder;

impl Default for BarcodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BarcodeDecoder {
    /// Создание декодера
    pub fn new() -> Self {
        Self
    }

    /// Декодирование всех штрих-кодов на изображении
    pub fn decode_image(&self, image: &DynamicImage) -> Result<Vec<DetectionRecord>, DecodeError> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let source = Luma8LuminanceSource::new(gray.as_raw().clone(), width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));

        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            DecodeHintType::TRY_HARDER,
            DecodeHintValue::TryHarder(true),
        );

        let mut reader = GenericMultipleBarcodeReader::new(MultiFormatReader::default());
        let results = match reader.decode_multiple_with_hints(&mut bitmap, &hints) {
            Ok(results) => results,
            Err(Exceptions::NotFoundException(_)) => return Ok(Vec::new()),
            Err(e) => return Err(DecodeError::Library(e.to_string())),
        };

        Ok(results
            .iter()
            .filter(|result| *result.getBarcodeFormat() != BarcodeFormat::QR_CODE)
            .map(|result| record_from_result(result, CodeKind::Barcode))
            .collect())
    }
}

/// Приведение результата rxing к общей записи
fn record_from_result(result: &RXingResult, kind: CodeKind) -> DetectionRecord {
    let polygon: Vec<(i32, i32)> = result
        .getRXingResultPoints()
        .iter()
        .map(|p| (p.getX().round() as i32, p.getY().round() as i32))
        .collect();

    let orientation = result
        .getRXingResultMetadata()
        .get(&RXingResultMetadataType::ORIENTATION)
        .and_then(|value| match value {
            RXingResultMetadataValue::Orientation(degrees) => Some(degrees.to_string()),
            _ => None,
        });

    let symbology = match kind {
        CodeKind::Barcode => Some(format!("{:?}", result.getBarcodeFormat())),
        CodeKind::Qr => None,
    };

    DetectionRecord {
        kind,
        payload: Some(result.getText().to_string()),
        symbology,
        bbox: bounding_rect(&polygon),
        polygon,
        orientation,
        confidence: 1.0,
        source: RecordSource::Decoded,
        class_id: None,
        filename: None,
        file_path: None,
    }
}

/// Осевой прямоугольник [x, y, w, h] вокруг набора точек
///
/// Пустой набор даёт нулевой прямоугольник; вырожденные (нулевой площади)
/// прямоугольники допустимы и передаются дальше как есть.
fn bounding_rect(points: &[(i32, i32)]) -> [i32; 4] {
    let Some(&(first_x, first_y)) = points.first() else {
        return [0, 0, 0, 0];
    };

    let (mut min_x, mut min_y) = (first_x, first_y);
    let (mut max_x, mut max_y) = (first_x, first_y);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    [min_x, min_y, max_x - min_x, max_y - min_y]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blank_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
    }

    #[test]
    fn test_bounding_rect() {
        let points = vec![(10, 20), (60, 15), (58, 70), (12, 72)];
        assert_eq!(bounding_rect(&points), [10, 15, 50, 57]);
    }

    #[test]
    fn test_bounding_rect_empty() {
        assert_eq!(bounding_rect(&[]), [0, 0, 0, 0]);
    }

    #[test]
    fn test_bounding_rect_degenerate_line() {
        // Две точки на одной горизонтали дают прямоугольник нулевой высоты
        let points = vec![(5, 40), (95, 40)];
        assert_eq!(bounding_rect(&points), [5, 40, 90, 0]);
    }

    #[test]
    fn test_qr_decoder_blank_image() {
        let decoder = QrDecoder::new(true);
        let records = decoder.decode_image(&blank_image(64, 64)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_barcode_decoder_blank_image() {
        let decoder = BarcodeDecoder::new();
        let records = decoder.decode_image(&blank_image(64, 64)).unwrap();
        assert!(records.is_empty());
    }
}
