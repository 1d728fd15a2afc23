//! YouDownload: paste a video URL, pick a quality, download it with yt-dlp

// yt-dlp metadata document and per-resolution stream catalog
mod catalog;
// Optional TOML settings
mod config;
// Background workers that run yt-dlp
mod downloader;
mod error;
// Mode/quality choices and format expressions
mod format;
// Window state and worker messages
mod model;
// Typed yt-dlp option set
mod options;
// Progress line parsing
mod progress;

use std::{future::Future, sync::Arc};

use config::Settings;
use downloader::{run_analyze, run_download, UiSender};
use format::{DownloadMode, Quality};
use model::{AppState, Notice, WorkerMessage};
use options::ExtractorOptions;

// eframe/egui for GUI application framework
use eframe::{egui, App, Frame};
use egui::Visuals;
use log::{error, info};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// Native pickers and message boxes
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use tokio::{
    runtime::Runtime,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

const WINDOW_TITLE: &str = "YouDownload — quality selector";

/// Program entry point: initializes logging, runtime and settings, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rt = Arc::new(Runtime::new()?);
    RUNTIME
        .set(rt)
        .map_err(|_| "Tokio runtime was already initialized")?;

    let settings = Settings::load();
    info!("Using yt-dlp at {}", settings.ytdlp_path);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([820.0, 520.0])
            .with_resizable(false),
        ..Default::default()
    };
    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(YouDownloadApp::new(&settings, cc.egui_ctx.clone()))
        }),
    )?;
    Ok(())
}

/// The single window: form state plus the queue workers post into
struct YouDownloadApp {
    state: AppState,
    extractor: ExtractorOptions,
    tx: UnboundedSender<WorkerMessage>,
    rx: UnboundedReceiver<WorkerMessage>,
    ctx: egui::Context,
}

impl YouDownloadApp {
    fn new(settings: &Settings, ctx: egui::Context) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            state: AppState::with_destination(settings.default_download_dir.clone()),
            extractor: ExtractorOptions::from_settings(settings),
            tx,
            rx,
            ctx,
        }
    }

    fn ui_sender(&self) -> UiSender {
        UiSender::new(self.tx.clone(), Some(self.ctx.clone()))
    }

    fn analyze(&mut self) {
        let Some(request) = self.state.analyze_request() else {
            return;
        };
        spawn(run_analyze(self.extractor.clone(), request, self.ui_sender()));
    }

    fn download(&mut self) {
        let Some(request) = self.state.begin_download() else {
            return;
        };
        spawn(run_download(self.extractor.clone(), request, self.ui_sender()));
    }

    fn choose_dir(&mut self) {
        if let Some(dir) = FileDialog::new().pick_folder() {
            self.state.session.destination = dir.display().to_string();
        }
    }

    fn choose_cookies(&mut self) {
        if let Some(file) = FileDialog::new().add_filter("TXT", &["txt"]).pick_file() {
            self.state.session.cookie_file = file.display().to_string();
        }
    }

    /// Selector text, with codec and frame rate when the catalog knows the height
    fn quality_label(&self, quality: Quality) -> String {
        let Quality::Height(h) = quality else {
            return quality.to_string();
        };
        match self.state.catalog.as_ref().and_then(|c| c.get(h)) {
            Some(stream) => format!(
                "{}p ({} fps, {}, id {})",
                stream.height,
                stream.fps.unwrap_or(0.0) as u32,
                stream.vcodec.as_deref().unwrap_or("?"),
                stream.format_id.as_deref().unwrap_or("?")
            ),
            None => quality.to_string(),
        }
    }
}

/// Runs a worker on the global runtime.
fn spawn<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match RUNTIME.get() {
        Some(rt) => {
            rt.spawn(task);
        }
        None => error!("Tokio runtime is not initialized; dropping task"),
    }
}

fn show_notice(notice: Notice) {
    let (level, title, message) = match notice {
        Notice::Info { title, message } => (MessageLevel::Info, title, message),
        Notice::Error { title, message } => (MessageLevel::Error, title, message),
    };
    MessageDialog::new()
        .set_level(level)
        .set_title(&title)
        .set_description(&message)
        .set_buttons(MessageButtons::Ok)
        .show();
}

/// GUI update loop: called each frame to apply worker results and redraw
impl App for YouDownloadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply everything the workers posted since the last frame
        while let Ok(message) = self.rx.try_recv() {
            if let Some(notice) = self.state.apply(message) {
                show_notice(notice);
            }
        }

        // 2️⃣ Form
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Grid::new("session_form")
                .num_columns(3)
                .spacing([8.0, 6.0])
                .show(ui, |ui| {
                    ui.label("URL");
                    ui.add(egui::TextEdit::singleline(&mut self.state.session.url).desired_width(560.0));
                    ui.end_row();

                    ui.label("Destination");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.state.session.destination)
                            .desired_width(460.0),
                    );
                    if ui.button("Select").clicked() {
                        self.choose_dir();
                    }
                    ui.end_row();

                    ui.label("Cookies (optional)");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.state.session.cookie_file)
                            .desired_width(460.0),
                    );
                    if ui.button("Browse").clicked() {
                        self.choose_cookies();
                    }
                    ui.end_row();
                });

            ui.add_space(8.0);
            if ui.button("Analyze video").clicked() {
                self.analyze();
            }

            // 3️⃣ Info summary
            ui.separator();
            ui.label(&self.state.info_text);
            ui.separator();

            // 4️⃣ Mode and quality
            ui.horizontal(|ui| {
                ui.label("Mode:");
                for mode in DownloadMode::ALL {
                    ui.radio_value(&mut self.state.mode, mode, mode.label());
                }
            });

            let labels: Vec<(Quality, String)> = self
                .state
                .quality_options
                .iter()
                .map(|q| (*q, self.quality_label(*q)))
                .collect();
            let selected = self.quality_label(self.state.quality);
            ui.horizontal(|ui| {
                ui.label("Quality:");
                egui::ComboBox::from_id_source("quality")
                    .selected_text(selected)
                    .width(240.0)
                    .show_ui(ui, |ui| {
                        for (quality, label) in labels {
                            ui.selectable_value(&mut self.state.quality, quality, label);
                        }
                    });
            });

            ui.add_space(10.0);
            if ui.button("Download").clicked() {
                self.download();
            }

            // 5️⃣ Progress
            ui.add_space(6.0);
            let progress = &self.state.progress;
            ui.add(egui::ProgressBar::new(progress.fraction()).show_percentage());
            ui.horizontal(|ui| {
                if progress.processing {
                    ui.spinner();
                }
                ui.label(&progress.status);
            });
        });
    }
}

