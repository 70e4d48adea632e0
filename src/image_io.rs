use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use thiserror::Error;

use crate::color_match::ColorSample;

/// 支持打开的图片扩展名（文件对话框过滤用）
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

// 导出时在取色点画的色块边长
const SWATCH_SIZE: u32 = 9;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image file not found: {0}")]
    NotFound(PathBuf),

    #[error("could not load image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("could not save image: {0}")]
    Save(#[from] image::ImageError),
}

/// 已加载的 8-bit RGB 图片，按坐标取像素颜色
#[derive(Clone)]
pub struct SourceImage {
    pub path: Option<PathBuf>,
    pixels: RgbImage,
}

impl SourceImage {
    /// 从磁盘加载图片：png/jpg/jpeg/gif（取首帧）/bmp
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        if !path.exists() {
            return Err(ImageError::NotFound(path.to_path_buf()));
        }
        let img = image::open(path).map_err(|source| ImageError::Decode { path: path.to_path_buf(), source })?;
        let mut loaded = Self::from_rgb(img.to_rgb8());
        loaded.path = Some(path.to_path_buf());
        log::info!("loaded image {} ({}x{})", path.display(), loaded.width(), loaded.height());
        Ok(loaded)
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { path: None, pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    /// 越界（含负坐标）返回 None
    pub fn pixel_at(&self, x: i32, y: i32) -> Option<ColorSample> {
        if x < 0 || y < 0 { return None; }
        let (x, y) = (x as u32, y as u32);
        if x >= self.width() || y >= self.height() { return None; }
        Some(ColorSample::from(self.pixels.get_pixel(x, y).0))
    }

    /// 在每个取色点上画一个实心色块（带 1px 对比色边框），返回新图
    pub fn annotated(&self, marks: &[(u32, u32, ColorSample)]) -> RgbImage {
        let mut out = self.pixels.clone();
        let half = (SWATCH_SIZE / 2) as i64;
        for &(cx, cy, color) in marks {
            let fill = Rgb(color.to_rgb8());
            let border = if color.prefers_light_text() { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) };
            for dy in -half..=half {
                for dx in -half..=half {
                    let x = cx as i64 + dx;
                    let y = cy as i64 + dy;
                    if x < 0 || y < 0 || x >= out.width() as i64 || y >= out.height() as i64 { continue; }
                    let edge = dx.abs() == half || dy.abs() == half;
                    out.put_pixel(x as u32, y as u32, if edge { border } else { fill });
                }
            }
        }
        out
    }
}

/// 保存为 PNG（按扩展名推断格式）
pub fn save_png(img: &RgbImage, path: &Path) -> Result<(), ImageError> {
    img.save(path)?;
    log::info!("exported {}", path.display());
    Ok(())
}
