use std::process::{ExitStatus, Stdio};

use eframe::egui;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

use crate::{
    catalog::{Analysis, VideoInfo},
    error::{Error, Result},
    model::{AnalyzeRequest, DownloadRequest, Operation, WorkerMessage},
    options::ExtractorOptions,
    progress::{parse_progress_from_line, ProgressEvent, PROGRESS_TEMPLATE},
};

/// Posts worker results to the UI thread and wakes it up.
#[derive(Clone)]
pub struct UiSender {
    tx: UnboundedSender<WorkerMessage>,
    ctx: Option<egui::Context>,
}

impl UiSender {
    pub fn new(tx: UnboundedSender<WorkerMessage>, ctx: Option<egui::Context>) -> Self {
        Self { tx, ctx }
    }

    pub fn send(&self, message: WorkerMessage) {
        // The window may already be closed; nothing left to update then.
        let _ = self.tx.send(message);
        if let Some(ctx) = &self.ctx {
            ctx.request_repaint();
        }
    }
}

/// Background task behind the "Analyze" button.
pub async fn run_analyze(opts: ExtractorOptions, request: AnalyzeRequest, ui: UiSender) {
    info!("Analyzing {}", request.url);
    match analyze(&opts, &request).await {
        Ok(analysis) => {
            if analysis.catalog.is_empty() {
                warn!("No video streams reported for {}", request.url);
            }
            info!(
                "Found {} distinct resolutions for \"{}\"",
                analysis.catalog.len(),
                analysis.title
            );
            ui.send(WorkerMessage::MetadataReady(analysis));
        }
        Err(e) => {
            error!("Analyze failed for {}: {e}", request.url);
            ui.send(WorkerMessage::Failed {
                operation: Operation::Analyze,
                message: e.to_string(),
            });
        }
    }
}

/// Background task behind the "Download" button.
pub async fn run_download(opts: ExtractorOptions, request: DownloadRequest, ui: UiSender) {
    info!("Downloading {} with format {}", request.url, request.format);
    match download(&opts, &request, &ui).await {
        Ok(()) => {
            info!("Download of {} completed", request.url);
            ui.send(WorkerMessage::Completed);
        }
        Err(e) => {
            error!("Download failed for {}: {e}", request.url);
            ui.send(WorkerMessage::Failed {
                operation: Operation::Download,
                message: e.to_string(),
            });
        }
    }
}

/// Runs `yt-dlp -J` and reduces the document to a stream catalog.
pub async fn analyze(opts: &ExtractorOptions, request: &AnalyzeRequest) -> Result<Analysis> {
    let opts = opts.clone().with_cookies(request.cookie_file.clone());
    let mut args = vec!["-J".to_owned(), "--skip-download".to_owned()];
    args.extend(opts.common_args());
    args.push(request.url.clone());
    debug!("{} {:?}", opts.program.display(), args);

    let output = Command::new(&opts.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| Error::Spawn {
            program: opts.program.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extractor(failure_message(stderr.lines(), output.status)));
    }

    let info: VideoInfo = serde_json::from_slice(&output.stdout)?;
    Ok(Analysis::from_info(info))
}

/// Runs the download, forwarding progress lines from both output streams.
pub async fn download(
    opts: &ExtractorOptions,
    request: &DownloadRequest,
    ui: &UiSender,
) -> Result<()> {
    let opts = opts.clone().with_cookies(request.cookie_file.clone());
    let mut args = opts.common_args();
    args.extend([
        "-f".to_owned(),
        request.format.clone(),
        "--newline".to_owned(),
        "--progress".to_owned(),
        "--progress-template".to_owned(),
        PROGRESS_TEMPLATE.to_owned(),
        "-o".to_owned(),
        request.output_template(),
        request.url.clone(),
    ]);
    debug!("{} {:?}", opts.program.display(), args);

    let mut child = Command::new(&opts.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Spawn {
            program: opts.program.display().to_string(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Extractor("yt-dlp stdout was not captured".to_owned()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Extractor("yt-dlp stderr was not captured".to_owned()))?;

    let stderr_ui = ui.clone();
    let stderr_task = tokio::spawn(async move {
        let mut collected = Vec::new();
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        while let Ok(Some(line)) = read_lossy_line(&mut reader, &mut buf).await {
            debug!("yt-dlp stderr> {line}");
            forward_progress(&line, &stderr_ui);
            collected.push(line);
        }
        collected
    });

    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = read_lossy_line(&mut reader, &mut buf).await? {
        debug!("yt-dlp> {line}");
        forward_progress(&line, ui);
    }

    let status = child.wait().await?;
    let stderr_lines = stderr_task.await.unwrap_or_default();
    if !status.success() {
        return Err(Error::Extractor(failure_message(
            stderr_lines.iter().map(String::as_str),
            status,
        )));
    }
    Ok(())
}

/// Reads one line, replacing bytes that are not UTF-8 (titles in the console code page on Windows).
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf[..]);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
}

fn forward_progress(line: &str, ui: &UiSender) {
    match parse_progress_from_line(line) {
        Some(ev @ ProgressEvent::Downloading { .. }) => ui.send(WorkerMessage::Progress {
            percent: ev.percent(),
            status: ev.status_text(),
        }),
        Some(ProgressEvent::Finished | ProgressEvent::PostProcessing) => {
            ui.send(WorkerMessage::Processing)
        }
        None => {}
    }
}

/// Picks the most useful line of yt-dlp's stderr for the error dialog.
fn failure_message<'a>(lines: impl Iterator<Item = &'a str>, status: ExitStatus) -> String {
    let mut last_error = None;
    let mut last_line = None;
    for line in lines.map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("ERROR:") {
            last_error = Some(line);
        }
        last_line = Some(line);
    }
    last_error
        .or(last_line)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt, path::Path, path::PathBuf};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    const INFO_JSON: &str = r#"{"title":"Fake clip","formats":[{"format_id":"140","vcodec":"none","height":null},{"format_id":"134","vcodec":"avc1.4d401e","height":360,"fps":25},{"format_id":"136","vcodec":"avc1.4d401f","height":720,"fps":30},{"format_id":"247","vcodec":"vp9","height":720,"fps":30}]}"#;

    /// Writes an executable `yt-dlp` stand-in that records its arguments to `args.txt`.
    fn fake_ytdlp(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("yt-dlp");
        let args_file = dir.join("args.txt");
        let script = format!(
            "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\" >> '{}'; done\n{body}\n",
            args_file.display()
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn recorded_args(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("args.txt"))
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn opts(program: PathBuf) -> ExtractorOptions {
        ExtractorOptions {
            program,
            ..Default::default()
        }
    }

    fn channel() -> (UiSender, UnboundedReceiver<WorkerMessage>) {
        let (tx, rx) = unbounded_channel();
        (UiSender::new(tx, None), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<WorkerMessage>) -> Vec<WorkerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn analyze_builds_catalog_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(dir.path(), &format!("printf '%s\\n' '{INFO_JSON}'"));
        let request = AnalyzeRequest {
            url: "https://example.com/v".into(),
            cookie_file: Some(PathBuf::from("/tmp/cookies.txt")),
        };

        let analysis = analyze(&opts(program), &request).await.unwrap();
        assert_eq!(analysis.title, "Fake clip");
        assert_eq!(analysis.catalog.heights(), vec![720, 360]);
        assert_eq!(
            analysis.catalog.get(720).unwrap().format_id.as_deref(),
            Some("247")
        );

        let args = recorded_args(dir.path());
        assert_eq!(&args[..2], ["-J", "--skip-download"]);
        assert!(args.windows(2).any(|w| w == ["--cookies", "/tmp/cookies.txt"]));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[tokio::test]
    async fn analyze_survives_collaborator_retries() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "echo 'WARNING: [youtube] Unable to download webpage: timed out. Retrying (1/10)...' >&2\n\
             echo 'WARNING: [youtube] Unable to download webpage: timed out. Retrying (2/10)...' >&2\n\
             printf '%s\\n' '{INFO_JSON}'"
        );
        let program = fake_ytdlp(dir.path(), &body);
        let (ui, mut rx) = channel();
        let request = AnalyzeRequest {
            url: "https://example.com/v".into(),
            cookie_file: None,
        };

        run_analyze(opts(program), request, ui).await;

        let args = recorded_args(dir.path());
        assert!(args.windows(2).any(|w| w == ["--retries", "10"]));
        match drain(&mut rx).as_slice() {
            [WorkerMessage::MetadataReady(a)] => assert_eq!(a.catalog.len(), 2),
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[tokio::test]
    async fn analyze_failure_carries_ytdlp_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(
            dir.path(),
            "echo '[generic] Extracting URL' >&2\n\
             echo 'ERROR: [generic] Unsupported URL: https://nope' >&2\n\
             echo 'see --help' >&2\nexit 1",
        );
        let (ui, mut rx) = channel();
        let request = AnalyzeRequest {
            url: "https://nope".into(),
            cookie_file: None,
        };

        run_analyze(opts(program), request, ui).await;

        assert_eq!(
            drain(&mut rx),
            vec![WorkerMessage::Failed {
                operation: Operation::Analyze,
                message: "ERROR: [generic] Unsupported URL: https://nope".into(),
            }]
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = AnalyzeRequest {
            url: "https://example.com/v".into(),
            cookie_file: None,
        };
        let err = analyze(&opts(dir.path().join("absent")), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn download_reports_progress_processing_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(
            dir.path(),
            "echo '[youtube] abc: Downloading webpage'\n\
             echo 'youdl:downloading|250|1000|NA'\n\
             echo 'youdl:downloading|1000|1000|NA'\n\
             echo 'youdl:finished|1000|1000|NA'\n\
             echo '[Merger] Merging formats into \"out.mkv\"'",
        );
        let (ui, mut rx) = channel();
        let request = DownloadRequest {
            url: "https://example.com/v".into(),
            output_dir: dir.path().join("out"),
            cookie_file: None,
            format: "bestvideo[height=720]+bestaudio/best".into(),
        };

        run_download(opts(program), request.clone(), ui).await;

        let messages = drain(&mut rx);
        assert!(matches!(
            &messages[0],
            WorkerMessage::Progress { percent: Some(p), .. } if *p == 25.0
        ));
        assert!(matches!(
            &messages[1],
            WorkerMessage::Progress { percent: Some(p), .. } if *p == 100.0
        ));
        assert_eq!(messages[2], WorkerMessage::Processing);
        assert_eq!(messages[3], WorkerMessage::Processing);
        assert_eq!(messages.last(), Some(&WorkerMessage::Completed));

        let args = recorded_args(dir.path());
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-f" && w[1] == "bestvideo[height=720]+bestaudio/best"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-o" && w[1] == request.output_template()));
        assert!(args.contains(&PROGRESS_TEMPLATE.to_owned()));
    }

    #[tokio::test]
    async fn download_failure_uses_last_stderr_line() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(
            dir.path(),
            "echo 'youdl:downloading|10|100|NA'\necho 'network unreachable' >&2\nexit 2",
        );
        let (ui, mut rx) = channel();
        let request = DownloadRequest {
            url: "https://example.com/v".into(),
            output_dir: dir.path().to_path_buf(),
            cookie_file: None,
            format: "bestaudio".into(),
        };

        run_download(opts(program), request, ui).await;

        let messages = drain(&mut rx);
        assert_eq!(
            messages.last(),
            Some(&WorkerMessage::Failed {
                operation: Operation::Download,
                message: "network unreachable".into(),
            })
        );
        assert!(!messages.contains(&WorkerMessage::Completed));
    }

    #[tokio::test]
    async fn undecodable_output_does_not_abort_download() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("done");
        let program = fake_ytdlp(
            dir.path(),
            &format!(
                "printf '[download] Destination: Canci\\363n.webm\\n'\n\
                 printf 'WARNING: t\\355tulo\\n' >&2\n\
                 echo 'youdl:downloading|500|1000|NA|vp9|none'\n\
                 echo 'youdl:finished|1000|1000|NA|vp9|none'\n\
                 touch '{}'",
                done.display()
            ),
        );
        let (ui, mut rx) = channel();
        let request = DownloadRequest {
            url: "https://example.com/v".into(),
            output_dir: dir.path().to_path_buf(),
            cookie_file: None,
            format: "bestvideo".into(),
        };

        run_download(opts(program), request, ui).await;

        let messages = drain(&mut rx);
        assert!(messages.iter().any(|m| matches!(
            m,
            WorkerMessage::Progress { percent: Some(p), status } if *p == 50.0 && status.starts_with("Downloading video")
        )));
        assert_eq!(messages.last(), Some(&WorkerMessage::Completed));
        assert!(done.exists());
    }

    #[tokio::test]
    async fn progress_on_stderr_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(
            dir.path(),
            "echo 'youdl:downloading|300|1200|NA|none|opus' >&2\n\
             echo 'youdl:finished|1200|1200|NA|none|opus' >&2",
        );
        let (ui, mut rx) = channel();
        let request = DownloadRequest {
            url: "https://example.com/v".into(),
            output_dir: dir.path().to_path_buf(),
            cookie_file: None,
            format: "bestaudio".into(),
        };

        run_download(opts(program), request, ui).await;

        let messages = drain(&mut rx);
        assert_eq!(
            messages[0],
            WorkerMessage::Progress {
                percent: Some(25.0),
                status: "Downloading audio 25.0% (300 B / 1.2 KiB)".into(),
            }
        );
        assert_eq!(messages[1], WorkerMessage::Processing);
        assert_eq!(messages.last(), Some(&WorkerMessage::Completed));
    }
}

