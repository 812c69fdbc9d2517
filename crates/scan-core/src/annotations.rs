//! YOLO annotation parsing and coordinate conversions
//!
//! Annotation files are plain text, one detection per line:
//! `class_id center_x center_y width height`, the last four normalized
//! to [0, 1] relative to the image dimensions.

use std::path::Path;

/// One line of a YOLO annotation file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
    pub class_id: u32,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Read a YOLO annotation file
///
/// A missing file yields an empty list. Malformed lines are skipped with a
/// warning; the rest of the file is still parsed.
pub fn read_yolo_annotation(annotation_path: &Path) -> Vec<YoloBox> {
    let raw = match std::fs::read_to_string(annotation_path) {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };

    let mut boxes = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        match parse_fields(&fields) {
            Some(parsed) => boxes.push(parsed),
            None => log::warn!(
                "Skipping malformed annotation line {} in {}",
                line_no + 1,
                annotation_path.display()
            ),
        }
    }

    boxes
}

fn parse_fields(fields: &[&str]) -> Option<YoloBox> {
    if fields.len() < 5 {
        return None;
    }

    Some(YoloBox {
        class_id: fields[0].parse().ok()?,
        center_x: fields[1].parse().ok()?,
        center_y: fields[2].parse().ok()?,
        width: fields[3].parse().ok()?,
        height: fields[4].parse().ok()?,
    })
}

/// Convert normalized YOLO coordinates to a pixel bounding box
pub fn yolo_to_bbox(
    center_x: f64,
    center_y: f64,
    width: f64,
    height: f64,
    image_width: u32,
    image_height: u32,
) -> [i32; 4] {
    let w = image_width as f64;
    let h = image_height as f64;

    let x = ((center_x - width / 2.0) * w).round() as i32;
    let y = ((center_y - height / 2.0) * h).round() as i32;
    let box_w = (width * w).round() as i32;
    let box_h = (height * h).round() as i32;

    [x, y, box_w, box_h]
}

/// Convert a pixel bounding box back to normalized YOLO coordinates
///
/// Exact inverse of [`yolo_to_bbox`] up to integer rounding: converting
/// bbox -> normalized -> bbox reproduces the original box.
pub fn bbox_to_yolo(bbox: [i32; 4], image_width: u32, image_height: u32) -> (f64, f64, f64, f64) {
    let w = image_width as f64;
    let h = image_height as f64;
    let [x, y, box_w, box_h] = bbox;

    let center_x = (x as f64 + box_w as f64 / 2.0) / w;
    let center_y = (y as f64 + box_h as f64 / 2.0) / h;
    let width = box_w as f64 / w;
    let height = box_h as f64 / h;

    (center_x, center_y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yolo_to_bbox() {
        assert_eq!(yolo_to_bbox(0.5, 0.5, 0.4, 0.4, 100, 100), [30, 30, 40, 40]);
        assert_eq!(yolo_to_bbox(0.5, 0.5, 0.2, 0.2, 200, 200), [80, 80, 40, 40]);
    }

    #[test]
    fn test_bbox_to_yolo() {
        let (cx, cy, w, h) = bbox_to_yolo([30, 30, 40, 40], 100, 100);
        assert!((cx - 0.5).abs() < 1e-9);
        assert!((cy - 0.5).abs() < 1e-9);
        assert!((w - 0.4).abs() < 1e-9);
        assert!((h - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_bbox_round_trip_is_exact() {
        let cases = [
            ([30, 30, 40, 40], 100, 100),
            ([0, 0, 1, 1], 100, 100),
            ([13, 27, 55, 8], 640, 480),
            ([80, 80, 40, 40], 200, 200),
            // Degenerate zero-area boxes pass through unchanged
            ([10, 10, 0, 0], 100, 100),
        ];

        for (bbox, w, h) in cases {
            let (cx, cy, bw, bh) = bbox_to_yolo(bbox, w, h);
            assert_eq!(yolo_to_bbox(cx, cy, bw, bh, w, h), bbox);
        }
    }

    #[test]
    fn test_normalized_round_trip_within_tolerance() {
        let cases = [
            (0.5, 0.5, 0.4, 0.4),
            (0.1, 0.9, 0.05, 0.12),
            (0.333, 0.667, 0.25, 0.5),
        ];

        for (cx, cy, w, h) in cases {
            let bbox = yolo_to_bbox(cx, cy, w, h, 200, 150);
            let (rcx, rcy, rw, rh) = bbox_to_yolo(bbox, 200, 150);
            assert!((rcx - cx).abs() < 0.01);
            assert!((rcy - cy).abs() < 0.01);
            assert!((rw - w).abs() < 0.01);
            assert!((rh - h).abs() < 0.01);
        }
    }

    #[test]
    fn test_read_annotation_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "0 0.5 0.5 0.2 0.2").unwrap();
        writeln!(file, "1 0.3").unwrap();
        writeln!(file, "not numbers at all here").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "2 0.25 0.75 0.1 0.3").unwrap();
        drop(file);

        let boxes = read_yolo_annotation(&path);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 0);
        assert!((boxes[0].center_x - 0.5).abs() < 1e-9);
        assert_eq!(boxes[1].class_id, 2);
    }

    #[test]
    fn test_read_annotation_missing_file() {
        let boxes = read_yolo_annotation(Path::new("does/not/exist.txt"));
        assert!(boxes.is_empty());
    }
}
