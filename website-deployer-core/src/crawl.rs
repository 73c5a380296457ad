//! Crawling the local server into static files with an external mirroring tool.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use regex::RegexSet;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::CrawlConfig;
use crate::error::{io_err, DeployError};

/// Outcome of inspecting one line of crawl output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlLine {
    Ok,
    /// The line matched the contained fatal pattern.
    Fatal(String),
}

/// Decides which crawl output lines end the deploy.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    patterns: Vec<String>,
    set: RegexSet,
}

impl LineClassifier {
    pub fn new(patterns: &[String]) -> Result<Self, DeployError> {
        Ok(Self {
            patterns: patterns.to_vec(),
            set: RegexSet::new(patterns)?,
        })
    }

    pub fn classify(&self, line: &str) -> CrawlLine {
        match self.set.matches(line).iter().next() {
            Some(i) => CrawlLine::Fatal(self.patterns[i].clone()),
            None => CrawlLine::Ok,
        }
    }
}

/// Absolute URLs to seed the crawl with: home page, 404 page, then the extras.
pub fn seed_urls(
    host: &str,
    port: u16,
    index_file: &str,
    not_found_file: &str,
    extra: &[String],
) -> Vec<String> {
    [index_file, not_found_file]
        .into_iter()
        .chain(extra.iter().map(String::as_str))
        .map(|path| path.trim())
        .filter(|path| !path.is_empty())
        .map(|path| format!("http://{host}:{port}/{}", path.trim_start_matches('/')))
        .collect()
}

/// Extra paths to crawl, one per line. A missing file means none.
pub fn read_extra_seeds(path: &Path) -> Result<Vec<String>, DeployError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(io_err(path, e)),
    }
}

pub fn write_seed_file(path: &Path, urls: &[String]) -> Result<(), DeployError> {
    std::fs::write(path, urls.join("\n")).map_err(|e| io_err(path, e))
}

/// Run the mirroring tool in `work_dir` against the seed file.
///
/// Output from both streams is collected line by line. The first line the
/// classifier marks fatal kills the tool and fails the deploy with the log so far.
pub async fn crawl(
    config: &CrawlConfig,
    work_dir: &Path,
    seed_file: &Path,
) -> Result<Vec<String>, DeployError> {
    let classifier = LineClassifier::new(&config.fatal_patterns)?;
    let mut args = config.args.clone();
    args.push("--input-file".to_string());
    args.push(seed_file.display().to_string());

    info!(program = %config.program, ?args, "Starting crawl");
    let mut child = Command::new(&config.program)
        .args(&args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| DeployError::Spawn {
            program: config.program.clone(),
            source,
        })?;

    let mut stdout = child.stdout.take().map(BufReader::new);
    let mut stderr = child.stderr.take().map(BufReader::new);
    let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
    let mut log: Vec<String> = Vec::new();

    while stdout.is_some() || stderr.is_some() {
        let (stream, next) = tokio::select! {
            line = async { read_line_lossy(stdout.as_mut()?, &mut out_buf).await.transpose() }, if stdout.is_some() => ("stdout", line),
            line = async { read_line_lossy(stderr.as_mut()?, &mut err_buf).await.transpose() }, if stderr.is_some() => ("stderr", line),
            else => break,
        };
        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Err(io_err(&config.program, e)),
            None => {
                match stream {
                    "stdout" => stdout = None,
                    _ => stderr = None,
                }
                continue;
            }
        };
        debug!(stream, line = %line, "crawl");
        let verdict = classifier.classify(&line);
        log.push(line);
        if let CrawlLine::Fatal(pattern) = verdict {
            error!(pattern = %pattern, "Crawl error detected, aborting");
            if let Err(e) = child.kill().await {
                warn!(error = ?e, "Failed to stop mirroring tool");
            }
            return Err(DeployError::CrawlAborted {
                log: log.join("\n"),
            });
        }
    }

    let status = child.wait().await.map_err(|e| io_err(&config.program, e))?;
    if status.success() {
        info!(lines = log.len(), "Crawl finished");
    } else {
        warn!(%status, lines = log.len(), "Crawl finished with non-zero exit status");
    }
    Ok(log)
}

/// Next line of tool output, with invalid UTF-8 replaced. `None` at end of stream.
///
/// Bytes from a read interrupted by the other stream stay in `buf` and are
/// completed by the next call.
async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    if reader.read_until(b'\n', buf).await? == 0 && buf.is_empty() {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(|c: char| c == '\n' || c == '\r')
        .to_string();
    buf.clear();
    Ok(Some(line))
}

/// Delete files the mirroring tool saved under query-string names.
pub fn remove_query_artifacts(root: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let mut artifacts = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;
        let is_artifact = entry
            .path()
            .strip_prefix(root)
            .map(|rel| rel.to_string_lossy().contains('?'))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_artifact {
            artifacts.push(entry.into_path());
        }
    }
    for path in &artifacts {
        std::fs::remove_file(path).map_err(|e| io_err(path, e))?;
        debug!(path = %path.display(), "Removed query-string artifact");
    }
    if !artifacts.is_empty() {
        info!(count = artifacts.len(), "Removed query-string artifacts");
    }
    Ok(artifacts)
}
