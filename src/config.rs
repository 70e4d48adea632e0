use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::palette::{EmbeddedPalettes, LoadError, Palette};

/// 未显式指定时在工作目录查找的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "color_detector.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("at least one category must be configured")]
    NoCategories,

    #[error("category label must not be empty")]
    EmptyLabel,

    #[error("duplicate category label {0:?}")]
    DuplicateLabel(String),

    #[error("category {0:?} has neither `palette` nor `builtin`")]
    NoPaletteSource(String),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1100.0,
            height: 760.0,
            title: "Color Detector".into(),
        }
    }
}

/// 一个匹配类别：`palette` 指向磁盘 CSV，缺省时使用 `builtin` 内置调色板
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CategoryConfig {
    pub label: String,
    #[serde(default)]
    pub palette: Option<PathBuf>,
    #[serde(default)]
    pub builtin: Option<String>,
}

impl CategoryConfig {
    fn builtin(label: &str, file: &str) -> Self {
        Self { label: label.into(), palette: None, builtin: Some(file.into()) }
    }

    /// 加载该类别的调色板；磁盘路径优先
    pub fn load_palette(&self) -> Result<Palette, LoadError> {
        match (&self.palette, &self.builtin) {
            (Some(path), _) => Palette::from_csv_path(&self.label, path),
            (None, Some(file)) => EmbeddedPalettes::load(&self.label, file),
            (None, None) => Err(LoadError::MissingEmbedded(self.label.clone())),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub image: Option<PathBuf>,
    pub log_file: PathBuf,
    pub recent_log_rows: usize,
    pub zoom: f32,
    pub window: WindowConfig,
    pub categories: Vec<CategoryConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image: None,
            log_file: PathBuf::from("color_log.csv"),
            recent_log_rows: 50,
            zoom: 1.0,
            window: WindowConfig::default(),
            categories: vec![
                CategoryConfig::builtin("Skin Tone", EmbeddedPalettes::SKIN_TONES),
                CategoryConfig::builtin("Fabric Dye", EmbeddedPalettes::FABRIC_DYES),
                CategoryConfig::builtin("Soil Type", EmbeddedPalettes::SOIL_COLORS),
            ],
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(text)?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut cfg = Self::from_toml_str(&data)?;
        cfg.resolve_relative_to(path.parent().unwrap_or(Path::new("")));
        Ok(cfg)
    }

    /// 显式给出的配置文件必须存在；否则尝试默认文件，不存在则用默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() { Self::load_from_file(default) } else { Ok(Self::default()) }
            }
        }
    }

    // 配置中的相对路径以配置文件所在目录为基准
    fn resolve_relative_to(&mut self, base: &Path) {
        if base.as_os_str().is_empty() { return; }
        let fix = |p: &mut PathBuf| if p.is_relative() { *p = base.join(&*p); };
        if let Some(img) = &mut self.image { fix(img); }
        fix(&mut self.log_file);
        for cat in &mut self.categories {
            if let Some(p) = &mut cat.palette { fix(p); }
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        let mut seen = HashSet::new();
        for cat in &self.categories {
            if cat.label.trim().is_empty() {
                return Err(ConfigError::EmptyLabel);
            }
            if !seen.insert(cat.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(cat.label.clone()));
            }
            if cat.palette.is_none() && cat.builtin.is_none() {
                return Err(ConfigError::NoPaletteSource(cat.label.clone()));
            }
        }
        Ok(())
    }

    /// 非致命问题，启动时记录为警告
    pub fn validate(&self) -> Vec<String> {
        let mut w = Vec::new();
        if self.window.width <= 0.0 || self.window.height <= 0.0 {
            w.push("window dimensions must be > 0".into());
        }
        if !(0.1..=16.0).contains(&self.zoom) {
            w.push(format!("zoom {} outside 0.1..16, clamped", self.zoom));
        }
        if self.recent_log_rows == 0 {
            w.push("recent_log_rows is 0; log panel will stay empty".into());
        }
        let builtins = EmbeddedPalettes::names();
        for cat in &self.categories {
            match (&cat.palette, &cat.builtin) {
                (Some(_), Some(_)) => w.push(format!("category {:?}: `palette` overrides `builtin`", cat.label)),
                (None, Some(b)) if !builtins.contains(b) => {
                    w.push(format!("category {:?}: unknown builtin {b:?}, available: {}", cat.label, builtins.join(", ")))
                }
                _ => {}
            }
        }
        w
    }

    /// 按顺序加载所有类别的调色板，任何一个失败即返回错误
    pub fn load_palettes(&self) -> Result<Vec<Palette>, LoadError> {
        self.categories.iter().map(CategoryConfig::load_palette).collect()
    }
}
