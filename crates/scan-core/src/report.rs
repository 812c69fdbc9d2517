//! Сохранение результатов и поиск изображений
//!
//! CSV-схема не фиксирована: заголовок собирается из объединения ключей
//! всех накопленных записей, отсортированного по алфавиту.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::DetectionRecord;

/// Расширения файлов, которые считаются изображениями
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Ошибки сохранения результатов
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Рекурсивный поиск изображений в каталоге
///
/// Результат отсортирован, чтобы порядок обработки был воспроизводим.
pub fn get_image_files(directory: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_image_files(directory, &mut files);
    files.sort();
    files
}

fn collect_image_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot read directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_image_files(&path, files);
        } else if is_image_file(&path) {
            files.push(path);
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Сохранение результатов в CSV
///
/// Отсутствующие у записи поля остаются пустыми ячейками; вложенные
/// значения (bbox, polygon) пишутся как JSON-текст. Пустой список записей
/// не создаёт файл.
pub fn save_results_csv(
    records: &[DetectionRecord],
    output_path: &Path,
) -> Result<(), ReportError> {
    if records.is_empty() {
        return Ok(());
    }
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        if let Value::Object(map) = serde_json::to_value(record)? {
            rows.push(map);
        }
    }

    let mut fieldnames = BTreeSet::new();
    for row in &rows {
        for key in row.keys() {
            fieldnames.insert(key.clone());
        }
    }

    let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(output_path)?));
    writer.write_record(&fieldnames)?;

    for row in &rows {
        let mut cells = Vec::with_capacity(fieldnames.len());
        for name in &fieldnames {
            let cell = match row.get(name) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            cells.push(cell);
        }
        writer.write_record(&cells)?;
    }

    writer.flush()?;
    Ok(())
}

/// Сохранение результатов в JSON (массив объектов, отступ 2 пробела)
pub fn save_results_json(
    records: &[DetectionRecord],
    output_path: &Path,
) -> Result<(), ReportError> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}
