use std::path::PathBuf;

use crate::{
    catalog::{Analysis, StreamCatalog},
    format::{format_selector, DownloadMode, Quality},
};

/// Placeholder shown in the info label before the first analysis
pub const INFO_PLACEHOLDER: &str = "Video information will appear here";

/// Text fields typed or picked by the user
#[derive(Debug, Clone, Default)]
pub struct SessionInput {
    pub url: String,
    /// Destination folder for downloads
    pub destination: String,
    /// Optional Netscape cookie file
    pub cookie_file: String,
}

impl SessionInput {
    fn url(&self) -> Option<String> {
        non_empty(&self.url)
    }

    fn cookies(&self) -> Option<PathBuf> {
        non_empty(&self.cookie_file).map(PathBuf::from)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Input for one metadata lookup
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub url: String,
    pub cookie_file: Option<PathBuf>,
}

/// Input for one download, computed when the button is pressed
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub cookie_file: Option<PathBuf>,
    /// yt-dlp `-f` expression
    pub format: String,
}

impl DownloadRequest {
    /// `<dir>/%(title)s.%(ext)s`, expanded by yt-dlp itself
    pub fn output_template(&self) -> String {
        self.output_dir.join("%(title)s.%(ext)s").display().to_string()
    }
}

/// Progress bar state for the current download
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    /// Percentage in `[0, 100]`
    pub percent: f32,
    pub status: String,
    /// Post-processing is running and no percentage is available
    pub processing: bool,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            percent: 0.0,
            status: String::new(),
            processing: false,
        }
    }
}

impl ProgressState {
    /// Highest percentage shown before the download is reported as successful
    const TRANSFER_CEILING: f32 = 99.9;

    pub fn start(&mut self) {
        self.percent = 0.0;
        self.status = "Starting…".to_string();
        self.processing = false;
    }

    pub fn update(&mut self, percent: Option<f32>, status: String) {
        if let Some(p) = percent {
            // Only move forward; separate video and audio transfers each restart at 0
            let p = p.clamp(0.0, Self::TRANSFER_CEILING);
            if p > self.percent {
                self.percent = p;
            }
        }
        self.status = status;
        self.processing = false;
    }

    pub fn processing(&mut self) {
        self.processing = true;
        self.status = "Processing…".to_string();
    }

    pub fn complete(&mut self) {
        self.percent = 100.0;
        self.status = "Completed".to_string();
        self.processing = false;
    }

    /// Leaves the percentage where it stopped.
    pub fn fail(&mut self) {
        self.status = "Failed".to_string();
        self.processing = false;
    }

    /// Fraction for `egui::ProgressBar`
    pub fn fraction(&self) -> f32 {
        self.percent / 100.0
    }
}

/// Which background operation a message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Analyze,
    Download,
}

/// Results posted from worker tasks to the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    MetadataReady(Analysis),
    Progress { percent: Option<f32>, status: String },
    Processing,
    Completed,
    Failed { operation: Operation, message: String },
}

/// Modal dialog the UI should open after applying a message
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info { title: String, message: String },
    Error { title: String, message: String },
}

/// Everything the window displays; only mutated on the UI thread
#[derive(Debug, Clone)]
pub struct AppState {
    pub session: SessionInput,
    pub mode: DownloadMode,
    pub quality: Quality,
    /// Entries of the quality selector, automatic first
    pub quality_options: Vec<Quality>,
    /// Catalog of the last successful analysis
    pub catalog: Option<StreamCatalog>,
    pub info_text: String,
    pub progress: ProgressState,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            session: SessionInput::default(),
            mode: DownloadMode::default(),
            quality: Quality::Best,
            quality_options: vec![Quality::Best],
            catalog: None,
            info_text: INFO_PLACEHOLDER.to_string(),
            progress: ProgressState::default(),
        }
    }
}

impl AppState {
    pub fn with_destination(destination: impl Into<String>) -> Self {
        let mut state = Self::default();
        state.session.destination = destination.into();
        state
    }

    /// `None` when there is no URL to analyze.
    pub fn analyze_request(&self) -> Option<AnalyzeRequest> {
        Some(AnalyzeRequest {
            url: self.session.url()?,
            cookie_file: self.session.cookies(),
        })
    }

    /// Resets progress and returns the request, or `None` without touching
    /// anything when the URL or destination is empty.
    pub fn begin_download(&mut self) -> Option<DownloadRequest> {
        let url = self.session.url()?;
        let output_dir = non_empty(&self.session.destination)?;
        self.progress.start();
        Some(DownloadRequest {
            url,
            output_dir: PathBuf::from(output_dir),
            cookie_file: self.session.cookies(),
            format: format_selector(self.mode, self.quality),
        })
    }

    /// Applies a worker message and tells the caller which dialog to open, if any.
    pub fn apply(&mut self, message: WorkerMessage) -> Option<Notice> {
        match message {
            WorkerMessage::MetadataReady(analysis) => {
                self.quality_options = std::iter::once(Quality::Best)
                    .chain(analysis.catalog.heights().into_iter().map(Quality::Height))
                    .collect();
                self.quality = Quality::Best;
                self.info_text = analysis.summary();
                self.catalog = Some(analysis.catalog);
                None
            }
            WorkerMessage::Progress { percent, status } => {
                self.progress.update(percent, status);
                None
            }
            WorkerMessage::Processing => {
                self.progress.processing();
                None
            }
            WorkerMessage::Completed => {
                self.progress.complete();
                Some(Notice::Info {
                    title: "Done".to_string(),
                    message: "Download completed".to_string(),
                })
            }
            WorkerMessage::Failed { operation, message } => {
                if operation == Operation::Download {
                    self.progress.fail();
                }
                Some(Notice::Error {
                    title: "Error".to_string(),
                    message,
                })
            }
        }
    }
}
