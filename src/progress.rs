/// Marker in front of every progress line we ask yt-dlp to print.
pub const PROGRESS_PREFIX: &str = "youdl:";

/// Value for `--progress-template`; fields missing in yt-dlp come out as `NA`.
pub const PROGRESS_TEMPLATE: &str = "download:youdl:%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(info.vcodec)s|%(info.acodec)s";

/// Post-processors that run after the transfer (muxing, extraction, fixups).
const POSTPROCESSOR_TAGS: [&str; 6] = [
    "[Merger]",
    "[ExtractAudio]",
    "[VideoConvertor]",
    "[VideoRemuxer]",
    "[FixupM3u8]",
    "[FixupM4a]",
];

/// Which half of a separate video+audio download is being transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Video,
    Audio,
}

impl TransferKind {
    /// Derived from the codecs of the format yt-dlp is fetching; combined streams give `None`.
    fn from_codecs(vcodec: Option<&str>, acodec: Option<&str>) -> Option<Self> {
        let present = |c: Option<&str>| c.is_some_and(|c| c != "none" && c != "NA");
        match (present(vcodec), present(acodec)) {
            (true, false) => Some(Self::Video),
            (false, true) => Some(Self::Audio),
            _ => None,
        }
    }
}

/// One line of yt-dlp output that matters to the progress bar.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        kind: Option<TransferKind>,
    },
    /// The transfer finished; post-processing may follow.
    Finished,
    PostProcessing,
}

impl ProgressEvent {
    /// Percentage of the current transfer, clamped to `[0, 100]`.
    pub fn percent(&self) -> Option<f32> {
        match self {
            Self::Downloading { downloaded, total: Some(total), .. } if *total > 0 => {
                Some(((*downloaded as f64 / *total as f64) * 100.0).clamp(0.0, 100.0) as f32)
            }
            _ => None,
        }
    }

    pub fn status_text(&self) -> String {
        match self {
            Self::Downloading { downloaded, total, kind } => {
                let what = match kind {
                    Some(TransferKind::Video) => "Downloading video",
                    Some(TransferKind::Audio) => "Downloading audio",
                    None => "Downloading",
                };
                match (self.percent(), total) {
                    (Some(pct), Some(total)) => format!(
                        "{what} {pct:.1}% ({} / {})",
                        human_bytes(*downloaded),
                        human_bytes(*total)
                    ),
                    _ => format!("{what} ({})", human_bytes(*downloaded)),
                }
            }
            Self::Finished | Self::PostProcessing => "Processing…".to_owned(),
        }
    }
}

pub fn parse_progress_from_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        let mut fields = rest.split('|');
        let status = fields.next()?;
        let downloaded = fields.next().and_then(parse_count);
        let total = fields.next().and_then(parse_count);
        let estimate = fields.next().and_then(parse_count);
        let vcodec = fields.next().map(str::trim);
        let acodec = fields.next().map(str::trim);
        return match status {
            "finished" => Some(ProgressEvent::Finished),
            "downloading" => Some(ProgressEvent::Downloading {
                downloaded: downloaded.unwrap_or(0),
                total: total.or(estimate),
                kind: TransferKind::from_codecs(vcodec, acodec),
            }),
            _ => None,
        };
    }
    POSTPROCESSOR_TAGS
        .iter()
        .any(|tag| line.starts_with(tag))
        .then_some(ProgressEvent::PostProcessing)
}

/// yt-dlp prints integers, floats for estimates, or `NA`.
fn parse_count(field: &str) -> Option<u64> {
    let field = field.trim();
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloading_line_with_total() {
        let ev = parse_progress_from_line("youdl:downloading|524288|1048576|NA").unwrap();
        assert_eq!(
            ev,
            ProgressEvent::Downloading { downloaded: 524288, total: Some(1048576), kind: None }
        );
        assert_eq!(ev.percent(), Some(50.0));
        assert_eq!(ev.status_text(), "Downloading 50.0% (512.0 KiB / 1.0 MiB)");
    }

    #[test]
    fn estimate_is_used_when_total_is_unknown() {
        let ev = parse_progress_from_line("youdl:downloading|250|NA|1000.5").unwrap();
        assert_eq!(ev.percent(), Some(25.0));
    }

    #[test]
    fn unknown_size_has_no_percentage() {
        let ev = parse_progress_from_line("youdl:downloading|2048|NA|NA").unwrap();
        assert_eq!(ev.percent(), None);
        assert_eq!(ev.status_text(), "Downloading (2.0 KiB)");
    }

    #[test]
    fn finished_and_postprocessor_lines() {
        assert_eq!(
            parse_progress_from_line("youdl:finished|1000|1000|NA"),
            Some(ProgressEvent::Finished)
        );
        assert_eq!(
            parse_progress_from_line("[Merger] Merging formats into \"/tmp/x.mkv\""),
            Some(ProgressEvent::PostProcessing)
        );
        assert_eq!(parse_progress_from_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_from_line("youdl:error|NA|NA|NA"), None);
    }

    #[test]
    fn percent_never_exceeds_hundred() {
        let ev = ProgressEvent::Downloading { downloaded: 2000, total: Some(1000), kind: None };
        assert_eq!(ev.percent(), Some(100.0));
    }

    #[test]
    fn status_names_the_separate_transfer() {
        let video = parse_progress_from_line("youdl:downloading|100|1000|NA|avc1.640028|none").unwrap();
        assert_eq!(video.status_text(), "Downloading video 10.0% (100 B / 1000 B)");

        let audio = parse_progress_from_line("youdl:downloading|30|1000|NA|none|opus").unwrap();
        assert!(matches!(
            audio,
            ProgressEvent::Downloading { kind: Some(TransferKind::Audio), .. }
        ));
        assert_eq!(audio.status_text(), "Downloading audio 3.0% (30 B / 1000 B)");

        let combined = parse_progress_from_line("youdl:downloading|30|1000|NA|avc1|mp4a.40.2").unwrap();
        assert_eq!(combined.status_text(), "Downloading 3.0% (30 B / 1000 B)");
    }
}
