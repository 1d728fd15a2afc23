//! Typed option set handed to yt-dlp on every invocation.

use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Where a bundled ffmpeg build is expected, relative to the executable's directory.
const BUNDLED_FFMPEG_DIR: &str = "ffmpeg-8.0-full_build/bin";

/// Options shared by the analyze and download calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorOptions {
    /// yt-dlp program name or path
    pub program: PathBuf,
    pub verbose: bool,
    /// Directory containing ffmpeg, if one was found
    pub ffmpeg_location: Option<PathBuf>,
    pub retries: u32,
    pub socket_timeout_secs: u64,
    pub geo_bypass: bool,
    pub cookie_file: Option<PathBuf>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            verbose: false,
            ffmpeg_location: None,
            retries: 10,
            socket_timeout_secs: 20,
            geo_bypass: true,
            cookie_file: None,
        }
    }
}

impl ExtractorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let ffmpeg_location = settings
            .ffmpeg_dir
            .clone()
            .or_else(|| exe_dir().and_then(|dir| bundled_ffmpeg_dir(&dir)));
        Self {
            program: PathBuf::from(&settings.ytdlp_path),
            verbose: settings.verbose,
            ffmpeg_location,
            retries: settings.retries,
            socket_timeout_secs: settings.socket_timeout_secs,
            geo_bypass: settings.geo_bypass,
            cookie_file: None,
        }
    }

    /// Same options with the given cookie file (or none).
    pub fn with_cookies(mut self, cookie_file: Option<PathBuf>) -> Self {
        self.cookie_file = cookie_file;
        self
    }

    /// Command-line arguments common to every call.
    pub fn common_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.verbose {
            args.push("--verbose".to_owned());
        }
        if let Some(dir) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_owned());
            args.push(dir.display().to_string());
        }
        args.push("--retries".to_owned());
        args.push(self.retries.to_string());
        args.push("--socket-timeout".to_owned());
        args.push(self.socket_timeout_secs.to_string());
        if self.geo_bypass {
            args.push("--geo-bypass".to_owned());
        }
        if let Some(cookies) = &self.cookie_file {
            args.push("--cookies".to_owned());
            args.push(cookies.display().to_string());
        }
        args
    }
}

fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Returns `<base>/ffmpeg-8.0-full_build/bin` when the ffmpeg binary is actually there.
pub fn bundled_ffmpeg_dir(base: &Path) -> Option<PathBuf> {
    let bin = base.join(BUNDLED_FFMPEG_DIR);
    let exe = if cfg!(target_os = "windows") { "ffmpeg.exe" } else { "ffmpeg" };
    bin.join(exe).is_file().then_some(bin)
}
