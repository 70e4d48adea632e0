use std::fmt;

use crate::palette::PaletteEntry;

/// 观测到的像素颜色：R/G/B 三通道整数，调用方负责保证取值范围
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ColorSample {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

impl ColorSample {
    pub const fn new(r: i32, g: i32, b: i32) -> Self {
        Self { r, g, b }
    }

    /// 横幅文字配色：亮度总和低于 600 用白字，否则用黑字
    pub fn prefers_light_text(&self) -> bool {
        self.r + self.g + self.b < 600
    }

    /// 截断到 0..=255，仅用于显示
    pub fn to_rgb8(self) -> [u8; 3] {
        let c = |v: i32| v.clamp(0, 255) as u8;
        [c(self.r), c(self.g), c(self.b)]
    }
}

impl From<[u8; 3]> for ColorSample {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0] as i32, rgb[1] as i32, rgb[2] as i32)
    }
}

/// 匹配结果：调色板为空时返回 `Unknown`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchResult<'a> {
    Named(&'a str),
    Unknown,
}

impl<'a> MatchResult<'a> {
    pub const UNKNOWN_NAME: &'static str = "Unknown";

    pub fn as_str(&self) -> &'a str {
        match *self {
            MatchResult::Named(name) => name,
            MatchResult::Unknown => Self::UNKNOWN_NAME,
        }
    }
}

impl fmt::Display for MatchResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 曼哈顿距离：三通道差值绝对值之和，u64 累加任意 i32 通道都不会溢出
#[inline]
pub fn manhattan_distance(a: ColorSample, b: ColorSample) -> u64 {
    a.r.abs_diff(b.r) as u64 + a.g.abs_diff(b.g) as u64 + a.b.abs_diff(b.b) as u64
}

/// 在 `palette` 中按顺序线性扫描，返回与 `sample` 距离最小的条目名
/// 仅在严格更小时更新，距离相同时保留先出现的条目
pub fn find_closest(sample: ColorSample, palette: &[PaletteEntry]) -> MatchResult<'_> {
    let mut best: Option<(u64, &str)> = None;
    for entry in palette {
        let d = manhattan_distance(sample, entry.color);
        if best.is_none_or(|(best_d, _)| d < best_d) {
            best = Some((d, &entry.name));
        }
    }
    best.map_or(MatchResult::Unknown, |(_, name)| MatchResult::Named(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, r: i32, g: i32, b: i32) -> PaletteEntry {
        PaletteEntry::new(name, ColorSample::new(r, g, b))
    }

    fn skin() -> Vec<PaletteEntry> {
        vec![
            entry("Fair", 255, 224, 189),
            entry("Medium", 204, 153, 102),
            entry("Dark", 102, 51, 0),
        ]
    }

    #[test]
    fn picks_minimum_manhattan_distance() {
        let sample = ColorSample::new(200, 150, 100);
        let pal = skin();
        let dists: Vec<u64> = pal.iter().map(|e| manhattan_distance(sample, e.color)).collect();
        assert_eq!(dists, vec![218, 9, 297]);
        assert_eq!(find_closest(sample, &pal), MatchResult::Named("Medium"));
    }

    #[test]
    fn empty_palette_is_unknown() {
        assert_eq!(find_closest(ColorSample::new(0, 0, 0), &[]), MatchResult::Unknown);
        assert_eq!(find_closest(ColorSample::new(255, 1, 77), &[]).as_str(), "Unknown");
    }

    #[test]
    fn exact_match_wins() {
        let pal = skin();
        for e in &pal {
            assert_eq!(find_closest(e.color, &pal).as_str(), e.name);
        }
    }

    #[test]
    fn ties_resolve_to_first_entry() {
        let pal = vec![entry("A", 10, 10, 10), entry("B", 10, 10, 10)];
        assert_eq!(find_closest(ColorSample::new(10, 10, 10), &pal).as_str(), "A");

        // 距离相等但不为零
        let pal = vec![entry("Low", 0, 0, 0), entry("High", 20, 20, 20)];
        assert_eq!(find_closest(ColorSample::new(10, 10, 10), &pal).as_str(), "Low");
    }

    #[test]
    fn result_always_comes_from_palette() {
        let pal = skin();
        for r in (0..=255).step_by(51) {
            for g in (0..=255).step_by(51) {
                for b in (0..=255).step_by(51) {
                    let name = find_closest(ColorSample::new(r, g, b), &pal).as_str();
                    assert!(pal.iter().any(|e| e.name == name), "{name} not in palette");
                }
            }
        }
    }

    #[test]
    fn moving_away_along_one_channel_keeps_result_when_others_stay_farther() {
        let pal = vec![entry("Near", 100, 100, 100), entry("Far", 250, 250, 250)];
        let mut sample = ColorSample::new(105, 100, 100);
        assert_eq!(find_closest(sample, &pal).as_str(), "Near");
        // 沿 R 通道远离 Near（Far 的距离随之减小但仍更大）
        for r in 106..=130 {
            sample.r = r;
            assert_eq!(find_closest(sample, &pal).as_str(), "Near");
        }
    }

    #[test]
    fn out_of_range_channels_are_accepted() {
        let pal = vec![entry("Black", 0, 0, 0), entry("White", 255, 255, 255)];
        assert_eq!(find_closest(ColorSample::new(-40, -1, 0), &pal).as_str(), "Black");
        assert_eq!(find_closest(ColorSample::new(400, 300, 999), &pal).as_str(), "White");
    }

    #[test]
    fn extreme_channels_neither_overflow_nor_lose_the_only_entry() {
        let origin = ColorSample::new(0, 0, 0);
        // 距离恰为 u32::MAX
        let pal = vec![entry("Only", i32::MAX, i32::MAX, 1)];
        assert_eq!(manhattan_distance(origin, pal[0].color), u32::MAX as u64);
        assert_eq!(find_closest(origin, &pal).as_str(), "Only");

        let pal = vec![entry("Max", i32::MAX, i32::MAX, i32::MAX)];
        assert_eq!(find_closest(origin, &pal).as_str(), "Max");

        let pal = vec![entry("Low", i32::MIN, i32::MIN, i32::MIN), entry("High", i32::MAX, i32::MAX, i32::MAX)];
        let top = ColorSample::new(i32::MAX, i32::MAX, i32::MAX);
        assert_eq!(manhattan_distance(top, pal[0].color), 3 * u32::MAX as u64);
        assert_eq!(find_closest(top, &pal).as_str(), "High");
        assert_eq!(find_closest(ColorSample::new(i32::MIN, 0, i32::MIN), &pal).as_str(), "Low");
    }

    #[test]
    fn light_text_threshold() {
        assert!(ColorSample::new(0, 0, 0).prefers_light_text());
        assert!(ColorSample::new(200, 200, 199).prefers_light_text());
        assert!(!ColorSample::new(200, 200, 200).prefers_light_text());
        assert!(!ColorSample::new(255, 255, 255).prefers_light_text());
    }
}
