#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use eframe::{NativeOptions, egui};
use env_logger::Env;

mod app;
mod color_match;
mod config;
mod detector;
mod event_log;
mod image_io;
mod palette;

use config::AppConfig;
use detector::Detector;
use event_log::EventLog;
use image_io::SourceImage;

/// 在图片上双击取色，与参考调色板（肤色、布料染料、土壤等）匹配并记录
#[derive(Parser, Debug)]
#[command(version, about = "Match clicked image colors against named reference palettes")]
struct Args {
    /// Image to open (overrides `image` in the config)
    image: Option<PathBuf>,

    /// Config file (TOML); defaults to ./color_detector.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file to append matches to (overrides `log_file` in the config)
    #[arg(short, long)]
    log: Option<PathBuf>,
}

/// 程序入口：加载配置/调色板/日志/图片，任一失败立即退出
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut cfg = AppConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(image) = args.image { cfg.image = Some(image); }
    if let Some(log_file) = args.log { cfg.log_file = log_file; }
    for warning in cfg.validate() {
        log::warn!("config: {warning}");
    }

    let palettes = cfg.load_palettes().context("loading palettes")?;
    for pal in &palettes {
        log::info!("{}: {} colors ({})", pal.label, pal.entries.len(), pal.source);
    }
    let log = EventLog::open(&cfg.log_file).with_context(|| format!("opening log {}", cfg.log_file.display()))?;

    let mut detector = Detector::new(palettes, log);
    if let Some(path) = &cfg.image {
        detector.set_image(SourceImage::open(path)?);
    }

    let native_options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([cfg.window.width.max(320.0), cfg.window.height.max(240.0)])
            .with_title(cfg.window.title.clone()),
        ..Default::default()
    };
    let zoom = cfg.zoom;
    let rows = cfg.recent_log_rows;
    eframe::run_native(
        &cfg.window.title,
        native_options,
        Box::new(move |cc| Box::new(app::DetectorApp::new(cc, detector, zoom, rows))),
    )
    .map_err(|e| anyhow::anyhow!("window error: {e}"))
}
