use std::collections::VecDeque;
use std::io::{BufReader, Read};
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::command::Command;
use crate::core::error::RunError;
use crate::core::job::{Job, JobStatus};
use crate::core::progress::{ProgressParser, ProgressSnapshot};

/// Kept stderr tail, reported on failure.
const STDERR_TAIL_BYTES: usize = 8 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Progress(ProgressSnapshot),
    Line(String),
}

/// Cross-platform cancellation handle: a shared flag the supervising loop
/// polls between line reads, killing the child when it flips. No signals.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

/// Runs a built command to completion, feeding every stderr line (and
/// stdout line, when the command requests `-progress pipe:1`) through the
/// caller's progress parser and invoking `on_event` for each line and each
/// parsed snapshot. Blocks until exit, timeout, or cancellation.
pub fn run(
    command: &Command,
    options: &RunOptions,
    parser: &mut ProgressParser,
    mut on_event: impl FnMut(RenderEvent),
) -> Result<Job, RunError> {
    let args = command.to_args();
    debug!(program = %command.program, args = args.len(), "spawning render process");

    // `-progress pipe:1` sends key=value progress records to stdout.
    let progress_pipe = args
        .windows(2)
        .any(|pair| pair[0] == "-progress" && pair[1] == "pipe:1");

    let mut job = Job::pending();
    job.status = JobStatus::Running;
    job.started_at = Some(Instant::now());

    let mut child = ProcessCommand::new(&command.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(if progress_pipe {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::BinaryNotFound
            } else {
                RunError::Io(e)
            }
        })?;

    let stderr = child.stderr.take().ok_or_else(|| {
        RunError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "failed to capture stderr",
        ))
    })?;

    let (line_tx, line_rx) = mpsc::channel::<String>();
    let mut reader_handles = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        reader_handles.push(spawn_line_reader(stdout, line_tx.clone()));
    }
    reader_handles.push(spawn_line_reader(stderr, line_tx));

    let started = Instant::now();
    let mut tail = StderrTail::new(STDERR_TAIL_BYTES);
    let mut outcome: Option<RunError> = None;

    loop {
        match line_rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                tail.push(&line);
                if let Some(snapshot) = parser.parse_line(&line) {
                    on_event(RenderEvent::Progress(snapshot));
                } else {
                    on_event(RenderEvent::Line(line));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(token) = &options.cancel {
            if token.is_cancelled() {
                warn!("render cancelled, killing process");
                kill_child(&mut child);
                outcome = Some(RunError::Cancelled);
                break;
            }
        }
        if let Some(timeout) = options.timeout {
            if started.elapsed() > timeout {
                warn!(timeout_s = timeout.as_secs_f64(), "render timed out, killing process");
                kill_child(&mut child);
                outcome = Some(RunError::TimedOut(timeout.as_secs_f64()));
                break;
            }
        }
    }

    // Drain whatever the reader already queued so the tail is complete.
    for line in line_rx.try_iter() {
        tail.push(&line);
    }
    for handle in reader_handles {
        let _ = handle.join();
    }

    let status = child.wait()?;
    job.ended_at = Some(Instant::now());
    job.exit_code = status.code();

    if let Some(error) = outcome {
        job.status = match error {
            RunError::Cancelled => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        };
        return Err(error);
    }

    if status.success() {
        job.status = JobStatus::Finished;
        Ok(job)
    } else {
        job.status = JobStatus::Failed;
        Err(RunError::ProcessFailed {
            exit_code: status.code(),
            stderr: tail.excerpt(),
        })
    }
}

fn kill_child(child: &mut Child) {
    let _ = child.kill();
}

/// Byte-wise line reader: ffmpeg progress lines end in `\r`, everything
/// else in `\n`, so both delimit.
fn spawn_line_reader<R: Read + Send + 'static>(
    reader: R,
    sender: Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut line_buf: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match reader.read(&mut byte) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            match byte[0] {
                b'\r' | b'\n' => {
                    if line_buf.is_empty() {
                        continue;
                    }
                    let line = String::from_utf8_lossy(&line_buf).to_string();
                    line_buf.clear();
                    if !line.is_empty() {
                        let _ = sender.send(line);
                    }
                }
                other => {
                    line_buf.push(other);
                }
            }
        }

        if !line_buf.is_empty() {
            let line = String::from_utf8_lossy(&line_buf).to_string();
            if !line.is_empty() {
                let _ = sender.send(line);
            }
        }
    })
}

/// Hands back a receiver fed by a background line reader, for callers that
/// integrate the loop themselves.
pub fn stream_lines<R: Read + Send + 'static>(reader: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    spawn_line_reader(reader, tx);
    rx
}

/// Bounded last-N-bytes line buffer for error reporting.
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
    limit: usize,
}

impl StderrTail {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            limit,
        }
    }

    fn push(&mut self, line: &str) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line.to_string());
        while self.bytes > self.limit && self.lines.len() > 1 {
            if let Some(dropped) = self.lines.pop_front() {
                self.bytes -= dropped.len() + 1;
            }
        }
    }

    fn excerpt(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
