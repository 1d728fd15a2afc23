//! Mode/quality choices and the yt-dlp `-f` expression they map to.

use std::fmt;

/// Label of the automatic quality entry in the selector.
pub const BEST_LABEL: &str = "best (automatic)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    #[default]
    VideoAudio,
    VideoOnly,
    AudioOnly,
}

impl DownloadMode {
    pub const ALL: [DownloadMode; 3] = [Self::VideoAudio, Self::VideoOnly, Self::AudioOnly];

    pub fn label(self) -> &'static str {
        match self {
            Self::VideoAudio => "Video + audio",
            Self::VideoOnly => "Video only",
            Self::AudioOnly => "Audio only",
        }
    }
}

/// Entry of the quality selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    /// Exact vertical resolution in pixels
    Height(u32),
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => f.write_str(BEST_LABEL),
            Self::Height(h) => write!(f, "{h}p"),
        }
    }
}

/// Builds the format-selection expression for yt-dlp.
pub fn format_selector(mode: DownloadMode, quality: Quality) -> String {
    match (mode, quality) {
        (DownloadMode::AudioOnly, _) => "bestaudio".to_owned(),
        (DownloadMode::VideoOnly, Quality::Best) => "bestvideo".to_owned(),
        (DownloadMode::VideoOnly, Quality::Height(h)) => format!("bestvideo[height={h}]/bestvideo"),
        (DownloadMode::VideoAudio, Quality::Best) => "bestvideo+bestaudio/best".to_owned(),
        (DownloadMode::VideoAudio, Quality::Height(h)) => {
            format!("bestvideo[height={h}]+bestaudio/best")
        }
    }
}
