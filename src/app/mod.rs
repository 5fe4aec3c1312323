//! Desktop viewer built on eframe
//!
//! Rendering and export run off the UI thread. Their results arrive over
//! channels polled once per frame; the clipboard is only touched here.

mod session;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Stroke, TextureHandle, Vec2};
use image::RgbaImage;

use crate::capture::{self, CaptureError};
use crate::clipboard::ClipboardSink;
use crate::config::{
    CANVAS_BACKGROUND_RGB, MAX_EXTRACT_PAGES_LIMIT, PLACEHOLDER_RGB, RECENT_FILES_LIMIT,
};
use crate::export::{ExportRange, Exporter};
use crate::pdf::{
    DocumentSource, PageBitmap, PageKey, PageLookup, RenderConfig, RenderEvent, ViewRect,
};
use crate::settings::{SettingsStore, WindowGeometry};

pub use session::Session;

/// Work finished on a background thread
enum TaskOutcome {
    Exported { path: PathBuf, range: ExportRange },
    ExportFailed(String),
    Captured(RgbaImage),
    CaptureFailed(CaptureError),
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Tool {
    #[default]
    Browse,
    Capture,
}

/// Scroll area geometry from the last frame, in layout coordinates
#[derive(Clone, Copy, Default)]
struct ViewportState {
    rect: ViewRect,
    /// Top-left of the page column on screen
    origin: Pos2,
    /// Horizontal offset that centers the column
    x_offset: f32,
}

impl ViewportState {
    fn to_layout(&self, pos: Pos2) -> (f32, f32) {
        (pos.x - self.origin.x - self.x_offset, pos.y - self.origin.y)
    }

    fn to_screen(&self, rect: &ViewRect) -> Rect {
        Rect::from_min_size(
            self.origin + Vec2::new(self.x_offset + rect.x, rect.y),
            Vec2::new(rect.width, rect.height),
        )
    }
}

pub struct PdfCropApp {
    store: SettingsStore,
    session: Option<Session>,
    render_config: RenderConfig,
    textures: HashMap<PageKey, TextureHandle>,
    clipboard: Box<dyn ClipboardSink>,
    exporter: Exporter,
    task_tx: flume::Sender<TaskOutcome>,
    task_rx: flume::Receiver<TaskOutcome>,
    busy: bool,
    tool: Tool,
    drag_start: Option<(f32, f32)>,
    viewport: ViewportState,
    /// Scroll offset to apply on the next frame
    scroll_to: Option<f32>,
    /// Restore the saved scroll fraction once the viewport size is known
    restore_fraction: Option<f32>,
    fit_on_next_frame: bool,
    /// Window title to apply on the next frame
    pending_caption: Option<String>,
    status: String,
    error_dialog: Option<String>,
}

impl PdfCropApp {
    #[must_use]
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        mut store: SettingsStore,
        initial: Option<PathBuf>,
        clipboard: Box<dyn ClipboardSink>,
        exporter: Exporter,
    ) -> Self {
        // Ctrl +/- zoom the page, not the whole UI
        cc.egui_ctx.options_mut(|o| o.zoom_with_keyboard = false);

        if store.settings_mut().cleanup_missing() > 0 {
            store.save_or_warn();
        }

        let (task_tx, task_rx) = flume::unbounded();
        let mut app = Self {
            store,
            session: None,
            render_config: RenderConfig::default(),
            textures: HashMap::new(),
            clipboard,
            exporter,
            task_tx,
            task_rx,
            busy: false,
            tool: Tool::default(),
            drag_start: None,
            viewport: ViewportState::default(),
            scroll_to: None,
            restore_fraction: None,
            fit_on_next_frame: false,
            pending_caption: None,
            status: String::new(),
            error_dialog: None,
        };

        let resumed = initial.is_none();
        let initial = initial.or_else(|| {
            app.store
                .settings()
                .last_file()
                .filter(|path| path.is_file())
        });
        if let Some(path) = initial {
            app.open(&path);
            // Resuming the last session keeps its zoom instead of fitting
            if resumed {
                let zoom = app.store.settings().zoom;
                if let Some(session) = app.session.as_mut() {
                    session.set_zoom(zoom, 0.0);
                }
                app.fit_on_next_frame = false;
            }
        }
        app
    }

    fn open(&mut self, path: &Path) {
        self.remember_current_file();

        match DocumentSource::open(path) {
            Ok(source) => {
                let file = self.store.settings().file_settings(source.path());
                self.pending_caption = Some(source.caption());
                let mut session = Session::new(source, self.render_config);
                session.max_extract_pages = file.max_extract_pages;

                self.session = Some(session);
                self.textures.clear();
                self.restore_fraction = Some(file.scroll_position);
                self.fit_on_next_frame = true;
                self.status = format!("Opened {}", path.display());

                let max = file.max_extract_pages;
                self.store
                    .settings_mut()
                    .update_file_settings(path, file.scroll_position, max);
                self.store.save_or_warn();
            }
            Err(e) => {
                log::error!("{e}");
                self.error_dialog = Some(e.to_string());
            }
        }
    }

    fn open_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("PDF", &["pdf"])
            .pick_file()
        {
            self.open(&path);
        }
    }

    /// Persist scroll position and export window of the open file
    fn remember_current_file(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let fraction = session.scroll_fraction(self.viewport.rect.height);
        let path = session.source().path().to_path_buf();
        let max = session.max_extract_pages;
        self.store
            .settings_mut()
            .update_file_settings(&path, fraction, max);
        self.store.settings_mut().zoom = session.zoom();
        self.store.save_or_warn();
    }

    fn copy_pages(&mut self) {
        if self.busy {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        let range = match session.export_range(&self.viewport.rect) {
            Ok(range) => range,
            Err(e) => {
                self.status = e.to_string();
                return;
            }
        };

        let exporter = self.exporter.clone();
        let source = session.source().path().to_path_buf();
        let stem = session.source().stem();
        let tx = self.task_tx.clone();
        self.busy = true;
        self.status = format!("Exporting {range}...");

        std::thread::spawn(move || {
            let outcome = match exporter.export(&source, &stem, range) {
                Ok(path) => TaskOutcome::Exported { path, range },
                Err(e) => TaskOutcome::ExportFailed(e.to_string()),
            };
            let _ = tx.send(outcome);
        });
    }

    fn capture(&mut self, selection: ViewRect) {
        if self.busy {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if let Err(e) = capture::validate_selection(&selection) {
            self.status = e.to_string();
            return;
        }

        let layout = session.layout().clone();
        let factory = session.source().rasterizer_factory();
        let tx = self.task_tx.clone();
        self.busy = true;
        self.status = "Capturing...".to_string();

        std::thread::spawn(move || {
            let outcome = match factory() {
                Ok(rasterizer) => {
                    match capture::capture_region(&layout, &selection, rasterizer.as_ref()) {
                        Ok(image) => TaskOutcome::Captured(image),
                        Err(e) => TaskOutcome::CaptureFailed(e),
                    }
                }
                Err(e) => TaskOutcome::CaptureFailed(CaptureError::Render {
                    page: 0,
                    reason: e.to_string().into(),
                }),
            };
            let _ = tx.send(outcome);
        });
    }

    fn handle_task_outcomes(&mut self) {
        while let Ok(outcome) = self.task_rx.try_recv() {
            self.busy = false;
            match outcome {
                TaskOutcome::Exported { path, range } => match self.clipboard.set_file(&path) {
                    Ok(()) => {
                        self.status = format!("Copied {range} to clipboard");
                        self.remember_current_file();
                    }
                    Err(e) => {
                        log::warn!("{e}");
                        self.status = format!("Exported to {} but {e}", path.display());
                    }
                },
                TaskOutcome::ExportFailed(message) => {
                    log::error!("Export failed: {message}");
                    self.error_dialog = Some(message);
                }
                TaskOutcome::Captured(image) => match self.clipboard.set_image(&image) {
                    Ok(()) => {
                        let (width, height) = image.dimensions();
                        self.status = format!("Copied {width}x{height} image to clipboard");
                    }
                    Err(e) => {
                        log::warn!("{e}");
                        self.status = e.to_string();
                    }
                },
                TaskOutcome::CaptureFailed(e) => {
                    if e.is_validation() {
                        self.status = e.to_string();
                    } else {
                        log::warn!("Capture failed: {e}");
                        self.error_dialog = Some(e.to_string());
                    }
                }
            }
        }
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let (dropped, copy, open, zoom_in, zoom_out, escape, zoom_delta) = ctx.input(|i| {
            let dropped = i
                .raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")));
            let cmd = i.modifiers.command;
            // The integration turns Ctrl+C into a copy event, not a key press
            let copy = i.events.iter().any(|e| matches!(e, egui::Event::Copy));
            (
                dropped,
                copy,
                cmd && i.key_pressed(egui::Key::O),
                cmd && (i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals)),
                cmd && i.key_pressed(egui::Key::Minus),
                i.key_pressed(egui::Key::Escape),
                i.zoom_delta(),
            )
        });

        if let Some(path) = dropped {
            self.open(&path);
        }
        if open {
            self.open_dialog();
        }
        if copy {
            self.copy_pages();
        }
        if escape {
            self.tool = Tool::Browse;
            self.drag_start = None;
        }

        let anchor = self.viewport.rect.height / 2.0;
        if zoom_in || zoom_delta > 1.0 {
            self.apply_zoom(|s| s.zoom_in(anchor));
        } else if zoom_out || zoom_delta < 1.0 {
            self.apply_zoom(|s| s.zoom_out(anchor));
        }
    }

    fn apply_zoom(&mut self, change: impl FnOnce(&mut Session) -> bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if change(session) {
            self.scroll_to = Some(session.scroll_offset());
        }
    }

    fn draw_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("📂 Open").clicked() {
                    self.open_dialog();
                }
                self.draw_recent_menu(ui);
                ui.separator();

                let has_doc = self.session.is_some();
                ui.add_enabled_ui(has_doc, |ui| {
                    let copy = ui
                        .add_enabled(!self.busy, egui::Button::new("📋 Copy pages"))
                        .on_hover_text(
                            "Copy the current page and those before it as a PDF (Ctrl+C)",
                        );
                    if copy.clicked() {
                        self.copy_pages();
                    }

                    if let Some(session) = self.session.as_mut() {
                        let mut pages = session.max_extract_pages;
                        let changed = ui
                            .add(
                                egui::DragValue::new(&mut pages)
                                    .range(1..=MAX_EXTRACT_PAGES_LIMIT)
                                    .suffix(" pages"),
                            )
                            .changed();
                        if changed {
                            session.max_extract_pages = pages;
                        }
                    }

                    ui.separator();
                    let capturing = self.tool == Tool::Capture;
                    if ui.selectable_label(capturing, "✂ Capture").clicked() {
                        self.tool = if capturing { Tool::Browse } else { Tool::Capture };
                        self.drag_start = None;
                    }

                    ui.separator();
                    let anchor = self.viewport.rect.height / 2.0;
                    if ui.button("−").clicked() {
                        self.apply_zoom(|s| s.zoom_out(anchor));
                    }
                    if let Some(session) = &self.session {
                        ui.label(format!("{:.0}%", session.zoom() * 100.0));
                    }
                    if ui.button("+").clicked() {
                        self.apply_zoom(|s| s.zoom_in(anchor));
                    }
                    let width = self.viewport.rect.width;
                    if ui.button("Fit width").clicked() {
                        self.apply_zoom(|s| s.fit_width(width));
                    }
                });
            });
        });
    }

    fn draw_recent_menu(&mut self, ui: &mut egui::Ui) {
        let recent = self.store.settings().recent_files(RECENT_FILES_LIMIT);
        let mut chosen = None;
        let mut clear = false;

        ui.menu_button("Recent", |ui| {
            if recent.is_empty() {
                ui.weak("No recent files");
            }
            for path in &recent {
                let label = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                if ui.button(label).on_hover_text(path.display().to_string()).clicked() {
                    chosen = Some(path.clone());
                    ui.close_menu();
                }
            }
            ui.separator();
            if ui.button("Clear list").clicked() {
                clear = true;
                ui.close_menu();
            }
        });

        if clear {
            self.store.settings_mut().clear_recent();
            self.store.save_or_warn();
        }
        if let Some(path) = chosen {
            if path.is_file() {
                self.open(&path);
            } else {
                self.store.settings_mut().remove_recent(&path);
                self.store.save_or_warn();
                self.error_dialog = Some(format!("File not found: {}", path.display()));
            }
        }
    }

    fn draw_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(session) = &self.session {
                    let current = session.current_page(&self.viewport.rect);
                    ui.label(format!("{} / {}", current + 1, session.source().page_count()));
                    ui.separator();
                }
                if self.busy {
                    ui.spinner();
                }
                ui.label(&self.status);
            });
        });
    }

    fn draw_pages(&mut self, ctx: &egui::Context) {
        let [r, g, b] = CANVAS_BACKGROUND_RGB;
        let frame = egui::Frame::central_panel(&ctx.style()).fill(Color32::from_rgb(r, g, b));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            if self.session.is_none() {
                ui.centered_and_justified(|ui| {
                    ui.heading("Open or drop a PDF to get started");
                });
                return;
            }

            let available = ui.available_size();
            if let Some(session) = self.session.as_mut() {
                session.set_pixels_per_point(ctx.pixels_per_point());
                if self.fit_on_next_frame {
                    self.fit_on_next_frame = false;
                    session.fit_width(available.x);
                }
                if let Some(fraction) = self.restore_fraction.take() {
                    session.restore_scroll_fraction(fraction, available.y);
                    self.scroll_to = Some(session.scroll_offset());
                }
            }

            // Dragging selects a region while capturing
            let mut area = egui::ScrollArea::both()
                .id_salt("pages")
                .auto_shrink([false, false])
                .drag_to_scroll(self.tool != Tool::Capture);
            if let Some(offset) = self.scroll_to.take() {
                area = area.vertical_scroll_offset(offset);
            }

            let output = area.show_viewport(ui, |ui, visible| self.draw_canvas(ctx, ui, visible));

            if let Some(session) = self.session.as_mut() {
                session.set_scroll_offset(output.state.offset.y, output.inner_rect.height());
            }
        });
    }

    fn draw_canvas(&mut self, ctx: &egui::Context, ui: &mut egui::Ui, visible: Rect) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let layout = session.layout();
        let content_width = layout.max_width().max(visible.width());
        let content = Rect::from_min_size(
            ui.max_rect().min,
            Vec2::new(content_width, layout.total_height()),
        );
        let sense = if self.tool == Tool::Capture {
            Sense::drag()
        } else {
            Sense::hover()
        };
        let response = ui.allocate_rect(content, sense);

        self.viewport = ViewportState {
            rect: ViewRect::new(
                visible.min.x - (content_width - layout.max_width()) / 2.0,
                visible.min.y,
                visible.width(),
                visible.height(),
            ),
            origin: content.min,
            x_offset: (content_width - layout.max_width()) / 2.0,
        };

        self.upload_ready_textures(ctx);
        let lookups = match self.session.as_ref() {
            Some(session) => session.request_visible(&self.viewport.rect),
            None => return,
        };

        let painter = ui.painter_at(content);
        let mut pending = false;
        for (page, lookup) in lookups {
            let Some(session) = self.session.as_ref() else {
                return;
            };
            let Some(rect) = session.layout().page_rect(page) else {
                continue;
            };
            let screen = self.viewport.to_screen(&rect);
            let key = session.key(page);
            match lookup {
                PageLookup::Ready(bitmap) => {
                    let texture = self
                        .textures
                        .entry(key)
                        .or_insert_with(|| page_texture(ctx, key, &bitmap));
                    painter.image(
                        texture.id(),
                        screen,
                        Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }
                PageLookup::Pending => {
                    pending = true;
                    let [r, g, b] = PLACEHOLDER_RGB;
                    painter.rect_filled(screen, 0.0, Color32::from_rgb(r, g, b));
                    painter.text(
                        screen.center(),
                        egui::Align2::CENTER_CENTER,
                        format!("Page {}", page + 1),
                        egui::FontId::proportional(14.0),
                        Color32::GRAY,
                    );
                }
                PageLookup::Failed(reason) => {
                    painter.rect_filled(screen, 0.0, Color32::from_rgb(0xfb, 0xe9, 0xe9));
                    painter.text(
                        screen.center(),
                        egui::Align2::CENTER_CENTER,
                        format!("Page {} could not be rendered\n{reason}", page + 1),
                        egui::FontId::proportional(14.0),
                        Color32::DARK_RED,
                    );
                }
            }
        }

        self.handle_capture_drag(&response, &painter);
        self.evict_textures();

        if pending || self.busy {
            ctx.request_repaint_after(std::time::Duration::from_millis(30));
        }
    }

    /// Upload bitmaps announced since the last frame
    fn upload_ready_textures(&mut self, ctx: &egui::Context) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        for event in session.relevant_events(&self.viewport.rect) {
            if let RenderEvent::Ready { key, bitmap } = event {
                self.textures
                    .entry(key)
                    .or_insert_with(|| page_texture(ctx, key, &bitmap));
            }
        }
    }

    /// Keep textures only for the current zoom and the pages near the viewport
    fn evict_textures(&mut self) {
        let Some(session) = self.session.as_ref() else {
            self.textures.clear();
            return;
        };
        let zoom_fixed = session.key(0).zoom_fixed;
        let wanted = session.wanted_pages(&self.viewport.rect);
        self.textures.retain(|key, _| {
            key.document == session.source().id()
                && key.zoom_fixed == zoom_fixed
                && wanted.as_ref().is_some_and(|w| w.contains(&key.page))
        });
    }

    fn handle_capture_drag(&mut self, response: &egui::Response, painter: &egui::Painter) {
        if self.tool != Tool::Capture {
            return;
        }
        let pointer = response
            .interact_pointer_pos()
            .map(|pos| self.viewport.to_layout(pos));

        if response.drag_started() {
            self.drag_start = pointer;
        }

        if let (Some(start), Some(current)) = (self.drag_start, pointer) {
            let selection = ViewRect::from_points(start, current);
            let screen = self.viewport.to_screen(&selection);
            painter.rect_filled(screen, 0.0, Color32::from_rgba_unmultiplied(80, 140, 255, 40));
            painter.rect_stroke(
                screen,
                0.0,
                Stroke::new(1.5, Color32::from_rgb(80, 140, 255)),
                egui::StrokeKind::Inside,
            );

            if response.drag_stopped() {
                self.drag_start = None;
                self.capture(selection);
            }
        }
    }

    fn draw_error_dialog(&mut self, ctx: &egui::Context) {
        let Some(message) = &self.error_dialog else {
            return;
        };

        let mut should_close = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("OK").clicked() {
                        should_close = true;
                    }
                });
            });

        if should_close {
            self.error_dialog = None;
        }
    }

    fn on_close_requested(&mut self, ctx: &egui::Context) {
        let geometry = ctx.input(|i| {
            let viewport = i.viewport();
            let position = viewport.outer_rect.map(|r| r.min);
            viewport.inner_rect.map(|inner| WindowGeometry {
                x: position.map_or(inner.min.x, |p| p.x),
                y: position.map_or(inner.min.y, |p| p.y),
                width: inner.width(),
                height: inner.height(),
            })
        });
        if geometry.is_some() {
            self.store.settings_mut().window_geometry = geometry;
        }
        self.remember_current_file();
        self.store.save_or_warn();
        log::info!("Window closing, settings saved");
    }
}

fn page_texture(ctx: &egui::Context, key: PageKey, bitmap: &PageBitmap) -> TextureHandle {
    let size = [bitmap.width as usize, bitmap.height as usize];
    let image = egui::ColorImage::from_rgb(size, &bitmap.pixels);
    ctx.load_texture(format!("page-{}", key.page), image, egui::TextureOptions::LINEAR)
}

impl eframe::App for PdfCropApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.on_close_requested(ctx);
        }

        if let Some(caption) = self.pending_caption.take() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(caption));
        }

        self.handle_task_outcomes();
        self.handle_input(ctx);
        self.draw_toolbar(ctx);
        self.draw_status_bar(ctx);
        self.draw_pages(ctx);
        self.draw_error_dialog(ctx);
    }
}
