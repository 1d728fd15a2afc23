//! Stream catalog derived from the `yt-dlp -J` metadata document.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Subset of the yt-dlp info document that the form displays.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// One entry of `formats` as yt-dlp reports it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub vcodec: Option<String>,
}

impl RawFormat {
    /// yt-dlp marks streams without video with the literal codec `"none"`.
    fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none")
    }
}

/// Representative stream kept for one height.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub format_id: Option<String>,
    pub height: u32,
    pub fps: Option<f64>,
    pub vcodec: Option<String>,
}

/// One descriptor per distinct height. Later formats overwrite earlier ones at the same height.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamCatalog {
    streams: BTreeMap<u32, StreamDescriptor>,
    pub max_height: u32,
    pub max_fps: u32,
    /// First non-null codec among the video formats, in yt-dlp's order.
    pub codec: Option<String>,
}

impl StreamCatalog {
    pub fn from_formats(formats: &[RawFormat]) -> Self {
        let mut catalog = Self::default();
        for f in formats {
            if f.is_audio_only() {
                continue;
            }
            let Some(height) = f.height.filter(|h| *h > 0) else {
                continue;
            };
            catalog.max_height = catalog.max_height.max(height);
            catalog.max_fps = catalog.max_fps.max(f.fps.unwrap_or(0.0) as u32);
            if catalog.codec.is_none() {
                catalog.codec = f.vcodec.clone();
            }
            catalog.streams.insert(
                height,
                StreamDescriptor {
                    format_id: f.format_id.clone(),
                    height,
                    fps: f.fps,
                    vcodec: f.vcodec.clone(),
                },
            );
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Distinct heights, highest first.
    pub fn heights(&self) -> Vec<u32> {
        self.streams.keys().rev().copied().collect()
    }

    pub fn get(&self, height: u32) -> Option<&StreamDescriptor> {
        self.streams.get(&height)
    }
}

/// Everything the analyze worker hands back to the form.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub title: String,
    pub catalog: StreamCatalog,
}

impl Analysis {
    pub fn from_info(info: VideoInfo) -> Self {
        Self {
            catalog: StreamCatalog::from_formats(&info.formats),
            title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Multi-line text for the info label.
    pub fn summary(&self) -> String {
        format!(
            "🎬 {}\n📺 Max resolution: {}p\n🎞 Max FPS: {}\n🎥 Codec: {}",
            self.title,
            self.catalog.max_height,
            self.catalog.max_fps,
            self.catalog.codec.as_deref().unwrap_or("unknown"),
        )
    }
}
