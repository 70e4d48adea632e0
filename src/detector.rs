use chrono::{DateTime, Local};

use crate::color_match::{ColorSample, find_closest};
use crate::event_log::{EventLog, LogError, LogRecord};
use crate::image_io::SourceImage;
use crate::palette::Palette;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryMatch {
    pub category: String,
    pub name: String,
}

/// 一次取色的结果：坐标、像素颜色、各类别的最近匹配
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detection {
    pub x: u32,
    pub y: u32,
    pub sample: ColorSample,
    pub matches: Vec<CategoryMatch>,
}

impl Detection {
    /// 横幅文本，例如 `Skin Tone: Medium | Soil Type: Loam (R=200, G=150, B=100)`
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self.matches.iter().map(|m| format!("{}: {}", m.category, m.name)).collect();
        let s = self.sample;
        format!("{} (R={}, G={}, B={})", parts.join(" | "), s.r, s.g, s.b)
    }
}

/// 取色结果；日志写入失败不影响本次结果
#[derive(Debug)]
pub struct DetectOutcome {
    pub detection: Detection,
    pub records: Vec<LogRecord>,
    pub log_error: Option<LogError>,
}

/// 应用状态：当前图片、各类别调色板、日志与最近一次取色
pub struct Detector {
    image: Option<SourceImage>,
    palettes: Vec<Palette>,
    log: EventLog,
    last: Option<Detection>,
    marks: Vec<(u32, u32, ColorSample)>,
}

impl Detector {
    pub fn new(palettes: Vec<Palette>, log: EventLog) -> Self {
        Self { image: None, palettes, log, last: None, marks: Vec::new() }
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    /// 更换图片时清空上一次结果和标记
    pub fn set_image(&mut self, image: SourceImage) {
        self.image = Some(image);
        self.clear();
    }

    pub fn palettes(&self) -> &[Palette] {
        &self.palettes
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn last(&self) -> Option<&Detection> {
        self.last.as_ref()
    }

    pub fn marks(&self) -> &[(u32, u32, ColorSample)] {
        &self.marks
    }

    pub fn clear(&mut self) {
        self.last = None;
        self.marks.clear();
    }

    /// 替换某个类别的调色板，保留类别名；返回被替换的旧调色板
    pub fn replace_palette(&mut self, index: usize, mut palette: Palette) -> Option<Palette> {
        let slot = self.palettes.get_mut(index)?;
        palette.label = slot.label.clone();
        Some(std::mem::replace(slot, palette))
    }

    pub fn detect(&mut self, x: i32, y: i32) -> Option<DetectOutcome> {
        self.detect_at(x, y, Local::now())
    }

    /// 读取 (x, y) 像素，逐类别匹配并写日志；没有图片或越界时返回 None
    pub fn detect_at(&mut self, x: i32, y: i32, now: DateTime<Local>) -> Option<DetectOutcome> {
        let sample = self.image.as_ref()?.pixel_at(x, y)?;
        let matches: Vec<CategoryMatch> = self
            .palettes
            .iter()
            .map(|p| CategoryMatch {
                category: p.label.clone(),
                name: find_closest(sample, &p.entries).to_string(),
            })
            .collect();

        let detection = Detection { x: x as u32, y: y as u32, sample, matches };
        log::info!("detected {}", detection.summary());

        let records: Vec<LogRecord> = detection
            .matches
            .iter()
            .map(|m| LogRecord::new(now, &m.category, &m.name, sample))
            .collect();
        let log_error = match self.log.append(&records) {
            Ok(()) => None,
            Err(e) => {
                log::error!("failed to write {}: {e}", self.log.path().display());
                Some(e)
            }
        };

        self.marks.push((detection.x, detection.y, sample));
        self.last = Some(detection.clone());
        Some(DetectOutcome { detection, records, log_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{PaletteEntry, PaletteSource};
    use image::{Rgb, RgbImage};

    fn palette(label: &str, entries: &[(&str, i32, i32, i32)]) -> Palette {
        Palette {
            label: label.into(),
            entries: entries.iter().map(|&(n, r, g, b)| PaletteEntry::new(n, ColorSample::new(r, g, b))).collect(),
            source: PaletteSource::Embedded(format!("{label}.csv")),
        }
    }

    fn setup(dir: &std::path::Path) -> Detector {
        let log = EventLog::open(dir.join("color_log.csv")).unwrap();
        let palettes = vec![
            palette("Skin Tone", &[("Fair", 255, 224, 189), ("Medium", 204, 153, 102), ("Dark", 102, 51, 0)]),
            palette("Fabric Dye", &[("Indigo", 41, 51, 112), ("Henna", 170, 90, 45)]),
            palette("Soil Type", &[]),
        ];
        let mut det = Detector::new(palettes, log);
        let mut img = RgbImage::new(8, 8);
        img.put_pixel(2, 3, Rgb([200, 150, 100]));
        det.set_image(SourceImage::from_rgb(img));
        det
    }

    #[test]
    fn matches_every_category_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let mut det = setup(dir.path());
        let now = Local::now();
        let out = det.detect_at(2, 3, now).unwrap();
        assert!(out.log_error.is_none());

        let names: Vec<(&str, &str)> = out.detection.matches.iter().map(|m| (m.category.as_str(), m.name.as_str())).collect();
        assert_eq!(names, [("Skin Tone", "Medium"), ("Fabric Dye", "Henna"), ("Soil Type", "Unknown")]);
        assert_eq!(
            out.detection.summary(),
            "Skin Tone: Medium | Fabric Dye: Henna | Soil Type: Unknown (R=200, G=150, B=100)"
        );
        assert_eq!(det.last(), Some(&out.detection));
        assert_eq!(det.marks(), &[(2, 3, ColorSample::new(200, 150, 100))]);

        let recent = det.log().read_recent(10).unwrap();
        assert_eq!(recent, out.records);
        assert_eq!(recent.len(), 3);
        assert!(recent.iter().all(|r| r.timestamp == recent[0].timestamp));
        assert_eq!(recent[1].category, "Fabric Dye");
        assert_eq!(recent[2].name, "Unknown");
    }

    #[test]
    fn out_of_bounds_or_no_image_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut det = setup(dir.path());
        assert!(det.detect(8, 0).is_none());
        assert!(det.detect(-1, 2).is_none());
        assert!(det.last().is_none());

        let log = EventLog::open(dir.path().join("other.csv")).unwrap();
        let mut empty = Detector::new(Vec::new(), log);
        assert!(empty.detect(0, 0).is_none());
        assert_eq!(empty.log().read_recent(5).unwrap().len(), 0);
    }

    #[test]
    fn log_failure_keeps_detection() {
        let dir = tempfile::tempdir().unwrap();
        let mut det = setup(dir.path());
        std::fs::remove_file(det.log().path()).unwrap();
        std::fs::create_dir(det.log().path()).unwrap();
        let out = det.detect(2, 3).unwrap();
        assert!(out.log_error.is_some());
        assert_eq!(out.detection.matches[0].name, "Medium");
        assert!(det.last().is_some());
    }

    #[test]
    fn replacing_palette_keeps_category_label() {
        let dir = tempfile::tempdir().unwrap();
        let mut det = setup(dir.path());
        let old = det.replace_palette(2, palette("whatever", &[("Loam", 120, 85, 60)])).unwrap();
        assert!(old.is_empty());
        assert!(det.replace_palette(9, palette("x", &[])).is_none());

        let out = det.detect(2, 3).unwrap();
        assert_eq!(out.detection.matches[2], CategoryMatch { category: "Soil Type".into(), name: "Loam".into() });
    }

    #[test]
    fn new_image_clears_previous_detection() {
        let dir = tempfile::tempdir().unwrap();
        let mut det = setup(dir.path());
        det.detect(0, 0).unwrap();
        assert_eq!(det.last().unwrap().sample, ColorSample::new(0, 0, 0));
        det.set_image(SourceImage::from_rgb(RgbImage::new(1, 1)));
        assert!(det.last().is_none());
        assert!(det.marks().is_empty());
    }
}
