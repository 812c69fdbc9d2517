//! Отрисовка результатов на изображении
//!
//! Рисует рамки, контуры и подписи на копии изображения. Подписи требуют
//! TTF-шрифт: берётся путь из конфигурации, иначе перебираются типовые
//! системные расположения.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::config::VisualizationConfig;
use crate::{DetectionRecord, ScanError};

/// Типовые расположения шрифтов для подписей
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
];

/// Базовый размер шрифта в пикселях; умножается на font_scale из конфигурации
const FONT_BASE_PX: f32 = 40.0;

/// Отрисовщик найденных кодов
pub struct Visualizer {
    config: VisualizationConfig,
    font: Option<FontVec>,
}

impl Visualizer {
    /// Создание отрисовщика; шрифт ищется один раз при создании
    pub fn new(config: VisualizationConfig) -> Self {
        let font = load_font(config.font_path.as_deref());
        if font.is_none() {
            log::warn!("No usable TTF font found, visualizations will not carry text labels");
        }
        Self { config, font }
    }

    /// Отрисовка всех записей на копии изображения
    pub fn draw_detections(
        &self,
        image: &DynamicImage,
        records: &[DetectionRecord],
    ) -> RgbImage {
        let mut canvas = image.to_rgb8();
        let color = Rgb(self.config.box_color);

        for record in records {
            self.draw_record(&mut canvas, record, color);
        }

        canvas
    }

    fn draw_record(&self, canvas: &mut RgbImage, record: &DetectionRecord, color: Rgb<u8>) {
        let [x, y, w, h] = record.bbox;

        // Вырожденные рамки не рисуются, но запись остаётся в выгрузке
        if w > 0 && h > 0 {
            for t in 0..self.config.box_thickness as i32 {
                let inner_w = w - 2 * t;
                let inner_h = h - 2 * t;
                if inner_w <= 0 || inner_h <= 0 {
                    break;
                }
                let rect = Rect::at(x + t, y + t).of_size(inner_w as u32, inner_h as u32);
                draw_hollow_rect_mut(canvas, rect, color);
            }
        }

        // Замкнутый контур, если библиотека его сообщила
        if record.polygon.len() >= 2 {
            for i in 0..record.polygon.len() {
                let (x0, y0) = record.polygon[i];
                let (x1, y1) = record.polygon[(i + 1) % record.polygon.len()];
                draw_line_segment_mut(
                    canvas,
                    (x0 as f32, y0 as f32),
                    (x1 as f32, y1 as f32),
                    color,
                );
            }
        }

        if let Some(font) = &self.font {
            let label = match &record.payload {
                Some(data) => data.clone(),
                None => record.kind.as_str().to_uppercase(),
            };
            if !label.is_empty() {
                self.draw_label(canvas, font, &label, x, y, color);
            }
        }
    }

    /// Подпись на цветной подложке над рамкой
    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        font: &FontVec,
        label: &str,
        x: i32,
        y: i32,
        color: Rgb<u8>,
    ) {
        let scale = PxScale::from(FONT_BASE_PX * self.config.font_scale);
        let (text_w, text_h) = text_size(scale, font, label);
        let text_w = text_w as i32;
        let text_h = text_h as i32;
        if text_w <= 0 || text_h <= 0 {
            return;
        }

        let label_y = y - text_h - 4;
        draw_filled_rect_mut(
            canvas,
            Rect::at(x, label_y).of_size(text_w as u32 + 4, text_h as u32 + 4),
            color,
        );
        draw_text_mut(
            canvas,
            Rgb([255, 255, 255]),
            x + 2,
            label_y + 2,
            scale,
            font,
            label,
        );
    }
}

fn load_font(configured: Option<&str>) -> Option<FontVec> {
    let mut candidates: Vec<&str> = Vec::new();
    if let Some(path) = configured {
        candidates.push(path);
    }
    candidates.extend_from_slice(FONT_CANDIDATES);

    for path in candidates {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                log::debug!("Loaded label font from {}", path);
                return Some(font);
            }
            Err(e) => log::debug!("Failed to parse font {}: {}", path, e),
        }
    }

    None
}

/// Имя выходного файла визуализации: `<stem>_detected<ext>` в каталоге вывода
pub fn create_output_filename(input_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = input_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    output_dir.join(format!("{stem}_detected{extension}"))
}

/// Сохранение визуализации; родительские каталоги создаются при записи
pub fn save_visualization(image: &RgbImage, output_path: &Path) -> Result<(), ScanError> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save(output_path)?;
    Ok(())
}
