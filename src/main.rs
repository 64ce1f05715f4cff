use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eframe::egui;
use glam::Vec2;

use morpho_viewer::config::{Backend, Coloring, ViewerConfig};
use morpho_viewer::net::{resolve_href, DefaultFetcher, Fetcher};
use morpho_viewer::viewer::{SwcViewer, ViewerState};

mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "View SWC neuron morphologies", long_about = None)]
struct Cli {
    /// SWC file path or URL
    #[arg(value_name = "HREF")]
    href: Option<String>,

    /// Prefix for relative hrefs
    #[arg(long)]
    base_url: Option<String>,

    /// Renderer: auto, cpu or gpu
    #[arg(long, default_value = "auto")]
    backend: Backend,

    /// Segment coloring: section or distance
    #[arg(long, default_value = "section")]
    coloring: Coloring,

    /// Render HREF once to this PNG file and exit
    #[arg(long, value_name = "PNG")]
    snapshot: Option<PathBuf>,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 768)]
    height: u32,
}

impl Cli {
    fn config(&self) -> ViewerConfig {
        let mut config = ViewerConfig::default()
            .with_backend(self.backend)
            .with_coloring(self.coloring);
        if let Some(base) = &self.base_url {
            config = config.with_base_url(base.clone());
        }
        config
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(path) = &cli.snapshot {
        if let Err(e) = run_snapshot(&cli, path) {
            log::error!("snapshot failed: {e}");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([cli.width as f32, cli.height as f32]),
        ..Default::default()
    };

    eframe::run_native(
        "Morpho Viewer",
        options,
        Box::new(move |cc| {
            let mut viewer = SwcViewer::new(cli.config());
            let ctx = cc.egui_ctx.clone();
            viewer.set_wakeup(move || ctx.request_repaint());
            if let Some(href) = &cli.href {
                viewer.set_href(href);
            }
            Ok(Box::new(ViewerApp::new(viewer, cli.href.clone().unwrap_or_default())))
        }),
    )
    .expect("Failed to start Morpho Viewer");
}

/// Fetch, render off-screen and write a PNG.
fn run_snapshot(cli: &Cli, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let href = cli.href.as_deref().ok_or("--snapshot needs an HREF")?;
    let config = cli.config();
    let url = resolve_href(config.base_url.as_deref(), href)?;
    let text = DefaultFetcher::new().fetch_text(&url)?;

    let mut viewer = SwcViewer::with_fetcher(config, Arc::new(DefaultFetcher::new()));
    viewer.resize(cli.width, cli.height);
    viewer.load_text(&text);
    if let ViewerState::Failed(e) = viewer.state() {
        return Err(e.clone().into());
    }
    let frame = viewer
        .snapshot(cli.width, cli.height)
        .ok_or("no render context")?;
    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.color)
        .ok_or("frame buffer size mismatch")?;
    image.save(path)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

struct ViewerApp {
    viewer: SwcViewer,
    href_input: String,
    texture: Option<egui::TextureHandle>,
    uploaded_serial: Option<u64>,
    fullscreen: bool,
}

impl ViewerApp {
    fn new(viewer: SwcViewer, href_input: String) -> Self {
        Self {
            viewer,
            href_input,
            texture: None,
            uploaded_serial: None,
            fullscreen: false,
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let edit = ui.add(egui::TextEdit::singleline(&mut self.href_input).desired_width(360.0));
            let enter = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if (ui.button("Load").clicked() || enter) && !self.href_input.trim().is_empty() {
                self.viewer.set_href(self.href_input.trim());
            }

            ui.separator();
            let mut coloring = self.viewer.config().coloring;
            egui::ComboBox::from_id_salt("coloring")
                .selected_text(match coloring {
                    Coloring::Section => "Section",
                    Coloring::Distance => "Distance",
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut coloring, Coloring::Section, "Section");
                    ui.selectable_value(&mut coloring, Coloring::Distance, "Distance");
                });
            self.viewer.set_coloring(coloring);

            ui.separator();
            if ui.button(if self.fullscreen { "Exit fullscreen" } else { "Fullscreen" }).clicked() {
                self.fullscreen = !self.fullscreen;
                ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.fullscreen));
            }

            ui.separator();
            match self.viewer.state() {
                ViewerState::Idle => {
                    ui.label("Enter an SWC path or URL");
                }
                ViewerState::Loading | ViewerState::Reloading => {
                    ui.spinner();
                    ui.label("Loading…");
                }
                ViewerState::Ready => {
                    let nodes = self.viewer.nodes().map_or(0, |n| n.len());
                    ui.label(format!(
                        "{} nodes, {} segments",
                        nodes,
                        self.viewer.segment_count()
                    ));
                }
                ViewerState::Failed(e) => {
                    ui.colored_label(egui::Color32::from_rgb(200, 40, 40), e.to_string());
                }
                ViewerState::Disposed => {}
            }
        });
    }

    fn viewport(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let now = ctx.input(|i| i.time) * 1000.0;
        self.viewer
            .resize(rect.width().max(1.0) as u32, rect.height().max(1.0) as u32);

        let gizmo_center = rect.right_top()
            + egui::vec2(-(ui::GIZMO_RADIUS + ui::GIZMO_HANDLE + 8.0), ui::GIZMO_RADIUS + ui::GIZMO_HANDLE + 8.0);

        // Gizmo clicks take precedence over orbiting.
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let p = pos - gizmo_center;
                self.viewer
                    .pick_gizmo(Vec2::new(p.x, p.y), ui::GIZMO_RADIUS, ui::GIZMO_HANDLE);
            }
        }
        if response.dragged() {
            let d = response.drag_delta();
            self.viewer.drag(Vec2::new(d.x, d.y), now);
        } else if response.drag_stopped() {
            self.viewer.release(now);
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.1 {
                self.viewer.scroll(scroll / 50.0);
            }
        }

        self.viewer.frame(now);
        let serial = self.viewer.context().map(|c| c.frame_serial());
        if serial != self.uploaded_serial || self.texture.is_none() {
            if let Some(frame) = self.viewer.context().map(|c| c.frame()) {
                let image = ui::frame_image(frame);
                match &mut self.texture {
                    Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture = Some(ctx.load_texture("morphology", image, egui::TextureOptions::LINEAR));
                    }
                }
                self.uploaded_serial = serial;
            }
        }

        let painter = ui.painter_at(rect);
        match &self.texture {
            Some(tex) if self.viewer.context().is_some() => {
                painter.image(
                    tex.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
            _ => {
                painter.rect_filled(rect, 0.0, egui::Color32::WHITE);
            }
        }

        // Scale bar along the bottom edge.
        let bar = egui::Rect::from_min_max(egui::pos2(rect.left(), rect.bottom() - 28.0), rect.right_bottom());
        if let Some(ops) = self.viewer.scalebar_ops(bar.width() as f64, bar.height() as f64) {
            ui::paint_draw_ops(&painter, bar, ops);
        }

        ui::paint_gizmo(&painter, gizmo_center, &self.viewer.gizmo_handles(ui::GIZMO_RADIUS));

        if let Some(legend) = self.viewer.legend() {
            egui::Area::new(egui::Id::new("legend"))
                .fixed_pos(rect.left_top() + egui::vec2(12.0, 12.0))
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| ui::legend_widget(ui, &legend));
                });
        }

        if self.viewer.is_animating() {
            ctx.request_repaint();
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.viewer.poll();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ctx, ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.viewport(ctx, ui));
    }
}
