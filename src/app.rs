use eframe::egui::{self, Color32, Context, Key, RichText, Sense};
use egui_extras::{Column, TableBuilder};
use rfd::FileDialog;

use crate::color_match::ColorSample;
use crate::detector::Detector;
use crate::event_log::{self, LogRecord};
use crate::image_io::{self, IMAGE_EXTENSIONS, SourceImage};
use crate::palette::Palette;

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 16.0;

pub struct DetectorApp {
    pub detector: Detector,
    pub texture: Option<egui::TextureHandle>,
    pub zoom: f32,
    pub status: String,
    // 右侧日志表
    pub recent: Vec<LogRecord>,
    pub recent_limit: usize,
}

fn to_color32(c: ColorSample) -> Color32 {
    let [r, g, b] = c.to_rgb8();
    Color32::from_rgb(r, g, b)
}

fn text_color_for(c: ColorSample) -> Color32 {
    if c.prefers_light_text() { Color32::WHITE } else { Color32::BLACK }
}

impl DetectorApp {
    pub fn new(cc: &eframe::CreationContext<'_>, detector: Detector, zoom: f32, recent_limit: usize) -> Self {
        setup_theme(&cc.egui_ctx);
        let mut app = Self {
            detector,
            texture: None,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            status: String::new(),
            recent: Vec::new(),
            recent_limit,
        };
        app.status = match app.detector.image().and_then(|i| i.path.clone()) {
            Some(p) => format!("Loaded {}. Double-click the image to detect a color.", p.display()),
            None => "Open an image to start (File > Open image...).".into(),
        };
        app.refresh_recent();
        app
    }

    fn refresh_recent(&mut self) {
        match self.detector.log().read_recent(self.recent_limit) {
            Ok(records) => self.recent = records,
            Err(e) => log::warn!("could not read {}: {e}", self.detector.log().path().display()),
        }
    }

    // 纹理在图片变更后懒加载
    fn ensure_texture(&mut self, ctx: &Context) {
        if self.texture.is_some() { return; }
        if let Some(img) = self.detector.image() {
            let rgb = img.as_rgb();
            let color_image = egui::ColorImage::from_rgb([rgb.width() as usize, rgb.height() as usize], rgb.as_raw());
            self.texture = Some(ctx.load_texture("source-image", color_image, egui::TextureOptions::NEAREST));
        }
    }

    fn on_double_click(&mut self, x: i32, y: i32) {
        match self.detector.detect(x, y) {
            Some(outcome) => {
                self.status = match outcome.log_error {
                    Some(e) => format!("Detected, but logging failed: {e}"),
                    None => {
                        event_log::push_recent(&mut self.recent, &outcome.records, self.recent_limit);
                        format!("Logged at ({}, {}): {}", x, y, outcome.detection.summary())
                    }
                };
            }
            None => { self.status = format!("({x}, {y}) is outside the image"); }
        }
    }

    pub fn ui_menu(&mut self, ui: &mut egui::Ui, ctx: &Context) {
        ui.menu_button("File", |ui| {
            if ui.button("Open image...").clicked() {
                ui.close_menu();
                self.action_open_image();
            }
            ui.menu_button("Load palette CSV", |ui| {
                let labels: Vec<String> = self.detector.palettes().iter().map(|p| p.label.clone()).collect();
                for (index, label) in labels.iter().enumerate() {
                    if ui.button(format!("{label}...")).clicked() {
                        ui.close_menu();
                        self.action_load_palette(index);
                    }
                }
            });
            ui.separator();
            if ui.add_enabled(self.detector.image().is_some(), egui::Button::new("Export annotated PNG...")).clicked() {
                ui.close_menu();
                self.action_export_png();
            }
            ui.separator();
            if ui.button("Quit (Esc)").clicked() {
                ui.close_menu();
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });

        ui.menu_button("View", |ui| {
            ui.add(egui::Slider::new(&mut self.zoom, MIN_ZOOM..=MAX_ZOOM).logarithmic(true).text("Zoom"));
            if ui.button("Actual size").clicked() {
                self.zoom = 1.0;
                ui.close_menu();
            }
            if ui.button("Clear markers").clicked() {
                self.detector.clear();
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(RichText::new(&self.status).color(Color32::LIGHT_GRAY));
    }

    fn action_open_image(&mut self) {
        if let Some(path) = FileDialog::new().add_filter("Images", &IMAGE_EXTENSIONS).pick_file() {
            match SourceImage::open(&path) {
                Ok(img) => {
                    self.status = format!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
                    self.detector.set_image(img);
                    self.texture = None;
                }
                Err(e) => {
                    log::warn!("{e}");
                    self.status = format!("Open failed: {e}");
                }
            }
        }
    }

    fn action_load_palette(&mut self, index: usize) {
        let Some(label) = self.detector.palettes().get(index).map(|p| p.label.clone()) else { return; };
        if let Some(path) = FileDialog::new().add_filter("CSV", &["csv"]).pick_file() {
            match Palette::from_csv_path(label.clone(), &path) {
                Ok(pal) => {
                    self.status = format!("{label}: loaded {} colors from {}", pal.entries.len(), path.display());
                    self.detector.replace_palette(index, pal);
                }
                Err(e) => {
                    log::warn!("{label}: {e}");
                    self.status = format!("{label}: {e}");
                }
            }
        }
    }

    fn action_export_png(&mut self) {
        let Some(img) = self.detector.image() else {
            self.status = "No image loaded".into();
            return;
        };
        if let Some(path) = FileDialog::new().add_filter("PNG", &["png"]).set_file_name("annotated.png").save_file() {
            let annotated = img.annotated(self.detector.marks());
            self.status = match image_io::save_png(&annotated, &path) {
                Ok(()) => format!("Exported {}", path.display()),
                Err(e) => {
                    log::error!("{e}");
                    format!("Export failed: {e}")
                }
            };
        }
    }

    fn ui_palettes(&self, ui: &mut egui::Ui) {
        let last = self.detector.last();
        for (i, pal) in self.detector.palettes().iter().enumerate() {
            let matched = last.and_then(|d| d.matches.get(i)).map(|m| m.name.as_str());
            ui.label(RichText::new(&pal.label).strong());
            ui.label(RichText::new(pal.source.to_string()).small().color(Color32::GRAY));
            if pal.is_empty() {
                ui.label("(empty palette)");
            }
            ui.horizontal_wrapped(|ui| {
                ui.spacing_mut().item_spacing = egui::vec2(2.0, 2.0);
                // 只高亮第一个同名条目
                let mut highlighted = false;
                for entry in &pal.entries {
                    let (rect, response) = ui.allocate_exact_size(egui::vec2(14.0, 14.0), Sense::hover());
                    ui.painter().rect_filled(rect, 0.0, to_color32(entry.color));
                    if !highlighted && matched == Some(entry.name.as_str()) {
                        highlighted = true;
                        ui.painter().rect_stroke(rect.expand(1.0), 0.0, egui::Stroke::new(2.0, Color32::WHITE));
                    }
                    let c = entry.color;
                    response.on_hover_text(format!("{} ({}, {}, {})", entry.name, c.r, c.g, c.b));
                }
            });
            ui.add_space(6.0);
        }
    }

    fn ui_recent_log(&self, ui: &mut egui::Ui) {
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .header(18.0, |mut header| {
                header.col(|ui| { ui.strong("Category"); });
                header.col(|ui| { ui.strong("Name"); });
                header.col(|ui| { ui.strong("RGB"); });
            })
            .body(|mut body| {
                for rec in self.recent.iter().rev() {
                    body.row(18.0, |mut row| {
                        row.col(|ui| { ui.label(rec.category.as_str()); });
                        row.col(|ui| { ui.label(rec.name.as_str()).on_hover_text(rec.timestamp.as_str()); });
                        row.col(|ui| {
                            let s = rec.sample;
                            let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), Sense::hover());
                            ui.painter().rect_filled(rect, 2.0, to_color32(s));
                            ui.label(format!("{}, {}, {}", s.r, s.g, s.b));
                        });
                    });
                }
            });
    }
}

fn setup_theme(ctx: &egui::Context) {
    ctx.set_visuals(egui::Visuals::dark());
}

impl eframe::App for DetectorApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| { self.ui_menu(ui, ctx); });
        });

        // 取色结果横幅：以检测到的颜色填充
        if let Some(det) = self.detector.last() {
            let fill = to_color32(det.sample);
            let text = text_color_for(det.sample);
            let summary = det.summary();
            egui::TopBottomPanel::top("banner")
                .frame(egui::Frame::none().fill(fill).inner_margin(10.0))
                .show(ctx, |ui| {
                    ui.label(RichText::new(summary).color(text).size(15.0).strong());
                });
        }

        egui::SidePanel::right("right").resizable(true).default_width(300.0).show(ctx, |ui| {
            ui.heading("Palettes");
            egui::ScrollArea::vertical().id_source("palettes").max_height(ui.available_height() * 0.55).show(ui, |ui| {
                self.ui_palettes(ui);
            });
            ui.separator();
            ui.heading("Recent matches");
            ui.label(RichText::new(self.detector.log().path().display().to_string()).small().color(Color32::GRAY));
            self.ui_recent_log(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(tex) = &self.texture else {
                ui.centered_and_justified(|ui| { ui.label("Open an image, then double-click a point on it"); });
                return;
            };
            let tex_id = tex.id();
            let size = tex.size_vec2() * self.zoom;
            let zoom = self.zoom;
            let marks = self.detector.marks();
            let mut clicked_at: Option<(i32, i32)> = None;

            egui::ScrollArea::both().show(ui, |ui| {
                let (rect, response) = ui.allocate_exact_size(size, Sense::click());
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                ui.painter().image(tex_id, rect, uv, Color32::WHITE);

                // 已取色位置标记
                for (x, y, c) in marks {
                    let center = rect.min + egui::vec2((*x as f32 + 0.5) * zoom, (*y as f32 + 0.5) * zoom);
                    ui.painter().circle(center, 5.0, to_color32(*c), egui::Stroke::new(1.5, text_color_for(*c)));
                }

                if response.double_clicked() {
                    if let Some(pos) = response.interact_pointer_pos() {
                        let local = (pos - rect.min) / zoom;
                        clicked_at = Some((local.x.floor() as i32, local.y.floor() as i32));
                    }
                }
                response.on_hover_cursor(egui::CursorIcon::Crosshair);
            });

            if let Some((x, y)) = clicked_at { self.on_double_click(x, y); }
        });

        if ctx.input(|i| i.key_pressed(Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}
