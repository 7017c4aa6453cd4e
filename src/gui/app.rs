use eframe::egui;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::cell::RefCell;
use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::ItemRecord;
use crate::catalog;
use crate::config::{self, GuiConfig};
use crate::gui::APP_TITLE;
use crate::rows::ThumbState;
use crate::selection::ClickKind;
use crate::thumbs::{ThumbEvent, ThumbKey, ThumbnailLoader};
use crate::virtual_list::{ListConfig, VirtualList};

const PREVIEW_SIZE: (u32, u32) = (1024, 1024);

pub struct GuiApp {
    cfg: GuiConfig,
    root: PathBuf,
    list: VirtualList,

    catalog_rx: Option<Receiver<Vec<ItemRecord>>>,
    is_loading: bool,
    initial_load_done: bool,

    filter_input: String,
    applied_filter: String,

    // Texture uploads live here, not in the list core; retained to the keys
    // of currently materialized rows.
    textures: HashMap<ThumbKey, egui::TextureHandle>,

    // Activation lands in this slot via the list callback and is consumed
    // at the top of the next frame.
    activated: Rc<RefCell<Option<usize>>>,

    // Preview pane: a second, small loader at preview resolution.
    preview_loader: ThumbnailLoader,
    preview_item: Option<(String, PathBuf)>,
    preview_texture: Option<egui::TextureHandle>,
    preview_failed: bool,

    last_window_size: Option<(u32, u32)>,
    panel_width: f32,
}

impl GuiApp {
    pub fn new(cfg: GuiConfig, root: PathBuf) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let loader = ThumbnailLoader::new(cfg.thumb_cache_size(), workers);
        let list_cfg = ListConfig {
            row_height: cfg.row_height(),
            buffer_rows: cfg.buffer_rows(),
            thumb_size: cfg.thumb_size(),
            thumb_delay: cfg.thumb_delay(),
            settle_delay: cfg.settle_delay(),
        };
        let mut list = VirtualList::new(list_cfg, loader);

        let activated: Rc<RefCell<Option<usize>>> = Rc::new(RefCell::new(None));
        let slot = activated.clone();
        list.set_on_item_activated(Box::new(move |index| {
            *slot.borrow_mut() = Some(index);
        }));

        let catalog_rx = Some(catalog::spawn_scan(root.clone(), cfg.show_thumbnails()));
        let panel_width = cfg.panel_width.unwrap_or(450.0);
        let last_window_size = Some((cfg.width.unwrap_or(1280), cfg.height.unwrap_or(720)));

        Self {
            cfg,
            root,
            list,
            catalog_rx,
            is_loading: true,
            initial_load_done: false,
            filter_input: String::new(),
            applied_filter: String::new(),
            textures: HashMap::new(),
            activated,
            preview_loader: ThumbnailLoader::new(8, 2),
            preview_item: None,
            preview_texture: None,
            preview_failed: false,
            last_window_size,
            panel_width,
        }
    }

    fn drain_catalog(&mut self, now: Instant) {
        let Some(rx) = &self.catalog_rx else { return };
        if let Ok(items) = rx.try_recv() {
            if self.initial_load_done {
                self.list.refresh_items(items, now);
            } else {
                self.list.set_items(items, now);
                self.initial_load_done = true;
            }
            self.is_loading = false;
            self.catalog_rx = None;
        }
    }

    fn rescan(&mut self) {
        if self.catalog_rx.is_some() {
            return;
        }
        self.is_loading = true;
        self.catalog_rx = Some(catalog::spawn_scan(self.root.clone(), self.cfg.show_thumbnails()));
    }

    fn apply_filter(&mut self, now: Instant) {
        self.applied_filter = self.filter_input.clone();
        let needle = self.applied_filter.to_lowercase();
        if needle.is_empty() {
            self.list.set_filter(None, now);
        } else {
            self.list.set_filter(
                Some(Box::new(move |item: &ItemRecord| {
                    item.display_name.to_lowercase().contains(&needle)
                })),
                now,
            );
        }
    }

    fn open_preview(&mut self, index: usize) {
        let Some(item) = self.list.item(index) else { return };
        let Some(path) = item.resolved_path.clone() else { return };
        if let Some((_, old)) = self.preview_item.take() {
            self.preview_loader.release(&(old, PREVIEW_SIZE));
        }
        self.preview_texture = None;
        self.preview_failed = false;
        self.preview_loader.request(path.clone(), PREVIEW_SIZE);
        self.preview_item = Some((item.display_name.clone(), path));
    }

    fn drain_preview(&mut self, ctx: &egui::Context) {
        let current = self.preview_item.as_ref().map(|(_, p)| p.clone());
        for event in self.preview_loader.poll() {
            let key = event.key().clone();
            if current.as_deref() != Some(key.0.as_path()) {
                continue;
            }
            match event {
                ThumbEvent::Loaded(_, image) => {
                    let name = format!("preview_{}", key.0.display());
                    let texture = ctx.load_texture(name, (*image).clone(), Default::default());
                    self.preview_texture = Some(texture);
                }
                ThumbEvent::Failed(_) => self.preview_failed = true,
            }
        }
    }

    /// Upload textures for rows that finished decoding and drop textures
    /// whose rows left the window.
    fn sync_textures(&mut self, ctx: &egui::Context) {
        let thumb_size = self.cfg.thumb_size();
        let mut live: HashSet<ThumbKey> = HashSet::new();
        for row in self.list.rows() {
            let Some(key) = row.thumb_key(thumb_size) else { continue };
            if let ThumbState::Loaded(image) = &row.thumb {
                live.insert(key.clone());
                if !self.textures.contains_key(&key) {
                    let name = format!("thumb_{}", key.0.display());
                    let texture = ctx.load_texture(name, (**image).clone(), Default::default());
                    self.textures.insert(key, texture);
                }
            }
        }
        self.textures.retain(|k, _| live.contains(k));
    }

    fn show_list(&mut self, ui: &mut egui::Ui, now: Instant) {
        let row_height = self.list.row_height();
        let thumb_size = self.cfg.thumb_size();
        let show_thumbs = self.cfg.show_thumbnails();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.allocate_rect(
                    egui::Rect::from_min_size(
                        ui.cursor().min,
                        egui::vec2(0.0, self.list.total_height()),
                    ),
                    egui::Sense::hover(),
                );

                let clip_rect = ui.clip_rect();
                let origin_y = ui.min_rect().min.y;
                // One measurement source: the clip rect of the scroll
                // content, in raw points.
                let scroll_y = clip_rect.min.y - origin_y;
                self.list.on_scroll(scroll_y, clip_rect.height(), now);

                let (start, end) = self.list.range();
                let left = ui.min_rect().left();
                let width = ui.available_width();
                let mut clicked: Option<(usize, ClickKind)> = None;
                let mut double_clicked: Option<usize> = None;

                for i in start..end {
                    let Some(row) = self.list.row(i) else { continue };
                    let y = origin_y + i as f32 * row_height;
                    let row_rect = egui::Rect::from_min_size(
                        egui::pos2(left, y),
                        egui::vec2(width, row_height),
                    );
                    if !ui.is_rect_visible(row_rect) {
                        continue;
                    }

                    let selected = self.list.selection.is_selected(i);
                    if selected {
                        ui.painter()
                            .rect_filled(row_rect, 0.0, egui::Color32::from_rgb(0, 92, 128));
                    }

                    let mut text_x = row_rect.min.x + 4.0;
                    if show_thumbs {
                        let thumb_w = (thumb_size.0 as f32).min(row_height - 4.0).max(8.0);
                        let thumb_rect = egui::Rect::from_min_size(
                            egui::pos2(row_rect.min.x + 2.0, y + 2.0),
                            egui::vec2(thumb_w, row_height - 4.0),
                        );
                        self.paint_thumb(ui, row.thumb_key(thumb_size), &row.thumb, thumb_rect);
                        text_x = thumb_rect.max.x + 6.0;
                    }

                    let exists = row.path.as_ref().map(|p| p.exists()).unwrap_or(false);
                    let mut rich = egui::RichText::new(&row.display_name)
                        .family(egui::FontFamily::Monospace);
                    if selected {
                        rich = rich.color(egui::Color32::WHITE);
                    } else if !exists {
                        rich = rich.color(egui::Color32::RED).strikethrough();
                    }
                    let text_rect = egui::Rect::from_min_max(
                        egui::pos2(text_x, row_rect.min.y),
                        row_rect.max,
                    );
                    ui.put(text_rect, egui::Label::new(rich).truncate());

                    // Hit test by index at event time; nothing captured per row.
                    let resp = ui.interact(
                        row_rect,
                        ui.id().with(("row", i)),
                        egui::Sense::click(),
                    );
                    if resp.double_clicked() {
                        double_clicked = Some(i);
                    } else if resp.clicked() {
                        let kind = ui.ctx().input(|inp| {
                            if inp.modifiers.shift {
                                ClickKind::Shift
                            } else if inp.modifiers.command || inp.modifiers.ctrl {
                                ClickKind::Ctrl
                            } else {
                                ClickKind::Plain
                            }
                        });
                        clicked = Some((i, kind));
                    }
                }

                if let Some((i, kind)) = clicked {
                    self.list.handle_click(i, kind);
                }
                if let Some(i) = double_clicked {
                    self.list.handle_double_click(i);
                }
            });
    }

    fn paint_thumb(
        &self,
        ui: &egui::Ui,
        key: Option<ThumbKey>,
        state: &ThumbState,
        rect: egui::Rect,
    ) {
        match state {
            ThumbState::Loaded(_) => {
                let texture = key.and_then(|k| self.textures.get(&k));
                if let Some(texture) = texture {
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    ui.painter().image(texture.id(), rect, uv, egui::Color32::WHITE);
                } else {
                    // Decoded this frame, texture uploads next frame.
                    ui.painter().rect_filled(rect, 2.0, egui::Color32::from_gray(40));
                }
            }
            ThumbState::Failed => {
                ui.painter().rect_filled(rect, 2.0, egui::Color32::from_rgb(60, 20, 20));
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "!",
                    egui::FontId::monospace(rect.height() * 0.6),
                    egui::Color32::LIGHT_RED,
                );
            }
            ThumbState::Disabled | ThumbState::Queued | ThumbState::Pending => {
                ui.painter().rect_filled(rect, 2.0, egui::Color32::from_gray(40));
            }
        }
    }

    fn show_preview(&mut self, ui: &mut egui::Ui) {
        let Some((name, _)) = self.preview_item.clone() else {
            ui.centered_and_justified(|ui| {
                ui.label("Double-click an image to preview");
            });
            return;
        };
        ui.heading(&name);
        ui.separator();
        if let Some(texture) = &self.preview_texture {
            let avail = ui.available_size();
            let tex_size = texture.size_vec2();
            let scale = (avail.x / tex_size.x).min(avail.y / tex_size.y).min(1.0);
            ui.centered_and_justified(|ui| {
                ui.image((texture.id(), tex_size * scale));
            });
        } else if self.preview_failed {
            ui.colored_label(egui::Color32::LIGHT_RED, "Failed to load image");
        } else {
            ui.spinner();
        }
    }

    pub fn run(self) -> Result<(), eframe::Error> {
        let width = self.cfg.width.unwrap_or(1280) as f32;
        let height = self.cfg.height.unwrap_or(720) as f32;

        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default().with_inner_size([width, height]),
            ..Default::default()
        };

        let font_scale = self.cfg.font_scale.unwrap_or(1.0);

        eframe::run_native(
            APP_TITLE,
            options,
            Box::new(move |cc| {
                egui_extras::install_image_loaders(&cc.egui_ctx);
                if (font_scale - 1.0).abs() > f32::EPSILON {
                    cc.egui_ctx.set_zoom_factor(font_scale);
                }
                Ok(Box::new(self))
            }),
        )
    }
}

impl eframe::App for GuiApp {
    fn logic(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.drain_catalog(now);
        self.list.tick(now);
        self.drain_preview(ctx);
        self.sync_textures(ctx);

        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.last_window_size = Some((rect.width() as u32, rect.height() as u32));
        }

        let activated = self.activated.borrow_mut().take();
        if let Some(index) = activated {
            self.open_preview(index);
        }

        // Poll for worker results and due timers even when idle; the next
        // debounce deadline bounds how stale we can get.
        let wait = self
            .list
            .next_deadline()
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(std::time::Duration::from_millis(150))
            .min(std::time::Duration::from_millis(150));
        ctx.request_repaint_after(wait);
    }

    fn ui(&mut self, ui: &mut egui::Ui, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        egui::TopBottomPanel::top("toolbar").show_inside(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label("Filter:");
                let resp = ui.text_edit_singleline(&mut self.filter_input);
                if resp.changed() || (self.filter_input != self.applied_filter && resp.lost_focus())
                {
                    self.apply_filter(now);
                }
                if ui.button("Rescan").clicked() {
                    self.rescan();
                }
                if self.is_loading {
                    ui.spinner();
                    ui.label("Scanning...");
                }
            });
        });

        egui::TopBottomPanel::bottom("status").show_inside(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!(
                    "{} | {} images | {} shown | {} selected",
                    APP_TITLE,
                    self.list.total_len(),
                    self.list.filtered_len(),
                    self.list.selection.len(),
                ));
            });
        });

        egui::SidePanel::right("preview")
            .resizable(true)
            .default_width(self.panel_width)
            .show_inside(ui, |ui| {
                self.panel_width = ui.available_width();
                self.show_preview(ui);
            });

        egui::CentralPanel::default().show_inside(ui, |ui| {
            if self.list.total_len() == 0 && !self.is_loading {
                ui.centered_and_justified(|ui| {
                    ui.label(format!("No images found under {}", self.root.display()));
                });
            } else {
                self.show_list(ui, now);
            }
        });
    }

    fn on_exit(&mut self) {
        let mut cfg = self.cfg.clone();
        if let Some((w, h)) = self.last_window_size {
            cfg.width = Some(w);
            cfg.height = Some(h);
        }
        cfg.panel_width = Some(self.panel_width);
        cfg.last_directory = Some(self.root.clone());
        if let Err(e) = config::save_config(&cfg) {
            eprintln!("picalog: failed to save config: {e}");
        }
    }
}
