use std::{collections::VecDeque, path::Path, process::Stdio};

use tokio::{io::AsyncReadExt, process::Command, sync::Mutex};
use tracing::{debug, trace};

use crate::{
    config::EncoderSettings,
    error::{AssemblyError, Result},
    filter_graph::EncodeJob,
    progress::{LineSplitter, dispatch_line},
};

const STDERR_TAIL_LINES: usize = 12;

/// Structured events an encoder reports while a job runs. All are advisory.
pub trait EncoderObserver: Send {
    fn on_duration_known(&mut self, _seconds: f64) {}
    fn on_progress(&mut self, _elapsed_seconds: f64) {}
    fn on_complete(&mut self) {}
    fn on_error(&mut self, _cause: &str) {}
}

/// Observer that discards everything.
pub struct NoopObserver;

impl EncoderObserver for NoopObserver {}

/// Something that can execute [`EncodeJob`]s inside a run directory.
pub trait Encoder: Send {
    /// Make the encoder ready for jobs. Calling it again is a no-op.
    async fn initialize(&mut self) -> Result<()>;

    /// Run one job with `workdir` as the working directory for every asset name.
    async fn run(
        &mut self,
        job: &EncodeJob,
        workdir: &Path,
        observer: &mut dyn EncoderObserver,
    ) -> Result<()>;
}

/// The `ffmpeg` command-line binary.
pub struct FfmpegEncoder {
    settings: EncoderSettings,
    ready: bool,
}

impl FfmpegEncoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self {
            settings,
            ready: false,
        }
    }

    fn unavailable(&self, reason: impl ToString) -> AssemblyError {
        AssemblyError::EncoderUnavailable {
            program: self.settings.program.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Encoder for FfmpegEncoder {
    async fn initialize(&mut self) -> Result<()> {
        if self.ready {
            return Ok(());
        }

        let status = Command::new(&self.settings.program)
            .arg("-hide_banner")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !status.success() {
            return Err(self.unavailable(format!("-version exited with {status}")));
        }

        debug!(program = %self.settings.program.display(), "encoder ready");
        self.ready = true;
        Ok(())
    }

    async fn run(
        &mut self,
        job: &EncodeJob,
        workdir: &Path,
        observer: &mut dyn EncoderObserver,
    ) -> Result<()> {
        debug!(job = %job.label, args = ?job.args, "starting encode job");

        let mut child = Command::new(&self.settings.program)
            .arg("-hide_banner")
            .arg("-nostdin")
            .arg("-y")
            .args(&job.args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    self.unavailable(e)
                } else {
                    AssemblyError::IoError(e)
                }
            })?;

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(mut stderr) = child.stderr.take() {
            let mut splitter = LineSplitter::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stderr.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                for line in splitter.push(&buf[..n]) {
                    record_line(job, line, &mut tail, observer);
                }
            }
            if let Some(line) = splitter.finish() {
                record_line(job, line, &mut tail, observer);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let cause = format!(
                "encoder exited with {status}: {}",
                tail.make_contiguous().join(" | ")
            );
            observer.on_error(&cause);
            return Err(AssemblyError::encode(&job.label, cause));
        }

        observer.on_complete();
        debug!(job = %job.label, output = %job.output, "encode job finished");
        Ok(())
    }
}

fn record_line(
    job: &EncodeJob,
    line: String,
    tail: &mut VecDeque<String>,
    observer: &mut dyn EncoderObserver,
) {
    trace!(job = %job.label, "{line}");
    dispatch_line(&line, observer);
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

/// Owns the encoder and lets exactly one job run at a time.
pub struct ExclusiveEncoder<E> {
    inner: Mutex<E>,
}

impl<E: Encoder> ExclusiveEncoder<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            inner: Mutex::new(encoder),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.inner.lock().await.initialize().await
    }

    /// Run `job`, holding the encoder for the whole job.
    pub async fn run(
        &self,
        job: &EncodeJob,
        workdir: &Path,
        observer: &mut dyn EncoderObserver,
    ) -> Result<()> {
        let mut encoder = self.inner.lock().await;
        encoder.run(job, workdir, observer).await
    }

    pub fn into_inner(self) -> E {
        self.inner.into_inner()
    }
}
