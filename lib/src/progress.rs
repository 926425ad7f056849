//! Per-file progress rendering.
//!
//! A [`ProgressReporter`] draws a single-line progress bar when stdout is a
//! terminal and falls back to one plain line per update otherwise. Redraws are
//! throttled; the frame drawn by [`ProgressReporter::terminate`] is not.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use console::{style, Term};

use crate::format::{filesize, left_pad, progress_percent, right_pad, shorten};
use crate::rate::RateCounter;

pub const PROGRESS_COLUMNS: usize = 80;
pub const PROGRESS_TIMEOUT: Duration = Duration::from_millis(200);

const PROGRESS_EL_LEN: usize = 6;
const PROGRESS_PER_LEN: usize = 6;
const PROGRESS_RATE_LEN: usize = 8;
const PROGRESS_SERVER_LEN: usize = "dl99/99".len();
const PROGRESS_SIZE_LEN: usize = 13;
// " [" + "] " + four single spaces between the trailing fields
const PROGRESS_SEPARATORS: usize = 8;

/// In-memory sink for progress output.
pub type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Where progress output goes.
#[derive(Clone, Default)]
pub enum ProgressTarget {
    /// Standard output; redrawing bar when it is a terminal, lines otherwise.
    #[default]
    Stdout,
    /// Plain lines appended to a buffer.
    Capture(SharedBuffer),
}

impl ProgressTarget {
    /// Creates a capture target together with the buffer it writes to.
    pub fn capture() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (ProgressTarget::Capture(buffer.clone()), buffer)
    }
}

impl fmt::Debug for ProgressTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressTarget::Stdout => f.write_str("Stdout"),
            ProgressTarget::Capture(_) => f.write_str("Capture"),
        }
    }
}

enum Output {
    Term(Term),
    Capture(SharedBuffer),
}

/// One rendered bar, before styling.
#[derive(Debug, Clone, PartialEq)]
struct Frame {
    prefix: String,
    name: String,
    done: String,
    remain: String,
    percent: String,
    sizes: String,
    server: String,
    rate: String,
    elapsed: String,
}

impl Frame {
    fn plain(&self) -> String {
        format!(
            "{}{} [{}{}] {} {} {} {} {}",
            self.prefix,
            self.name,
            self.done,
            self.remain,
            self.percent,
            self.sizes,
            self.server,
            self.rate,
            self.elapsed
        )
    }

    fn styled(&self) -> String {
        format!(
            "{}{} [{}{}] {} {} {} {} {}",
            style(&self.prefix).bold().yellow(),
            style(&self.name).bold(),
            style(&self.done).green(),
            style(&self.remain).yellow(),
            style(&self.percent).bold().green(),
            style(&self.sizes).bold().cyan(),
            style(&self.server).cyan(),
            style(&self.rate).bold().yellow(),
            style(&self.elapsed).bold().blue()
        )
    }
}

/// Throttled progress renderer for one transfer attempt.
pub struct ProgressReporter {
    prefix: String,
    name: String,
    name_max: usize,
    current: u64,
    total: u64,
    peer: Option<String>,
    start: Instant,
    last: Option<Instant>,
    timeout: Duration,
    terminated: bool,
    tty: bool,
    rate: RateCounter,
    output: Output,
}

impl ProgressReporter {
    /// Creates a reporter for `name` expecting `total` bytes.
    ///
    /// The first redraw happens once the throttle timeout has passed.
    pub fn new(
        name: impl Into<String>,
        total: u64,
        rate: RateCounter,
        target: &ProgressTarget,
    ) -> Self {
        let (output, tty) = match target {
            ProgressTarget::Stdout => {
                let term = Term::stdout();
                let tty = term.is_term();
                (Output::Term(term), tty)
            }
            ProgressTarget::Capture(buffer) => (Output::Capture(buffer.clone()), false),
        };
        let now = Instant::now();
        Self {
            prefix: String::new(),
            name: name.into(),
            name_max: 0,
            current: 0,
            total,
            peer: None,
            start: now,
            last: Some(now),
            timeout: PROGRESS_TIMEOUT,
            terminated: false,
            tty,
            rate,
            output,
        }
    }

    /// Text drawn before the name, such as a `[01/12] ` serial.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Longest display name of the batch, used to keep the name column stable.
    pub fn with_name_max(mut self, name_max: usize) -> Self {
        self.name_max = name_max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn percent(&self) -> f64 {
        progress_percent(self.current as f64, self.total as f64)
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Records new progress and redraws if the throttle allows it.
    ///
    /// Updates that would move backwards for the same total are dropped.
    pub fn update(&mut self, current: u64, total: u64, peer: Option<&str>) {
        if self.terminated {
            return;
        }
        if total == self.total && current < self.current {
            return;
        }
        self.record(current, total, peer);
    }

    /// Ends this reporter. With `final_frame`, draws one last unthrottled
    /// frame at `total/total`.
    ///
    /// Only the first call has an effect.
    pub fn terminate(&mut self, final_frame: bool) {
        if self.terminated {
            return;
        }
        self.last = None;
        if final_frame {
            self.record(self.total, self.total, None);
        }
        if self.tty {
            if let Output::Term(term) = &self.output {
                let _ = term.write_line("");
            }
        }
        self.terminated = true;
    }

    fn record(&mut self, current: u64, total: u64, peer: Option<&str>) {
        self.current = current;
        self.total = total;
        if let Some(peer) = peer {
            self.peer = Some(peer.to_string());
        }
        let now = Instant::now();
        if let Some(last) = self.last {
            if now.duration_since(last) < self.timeout {
                return;
            }
        }
        self.last = Some(now);
        self.draw();
    }

    fn draw(&self) {
        if self.tty {
            let frame = self.frame(self.columns());
            if let Output::Term(term) = &self.output {
                let _ = term.clear_line();
                let _ = term.write_str(&frame.styled());
            }
        } else {
            self.write_line(&self.line());
        }
    }

    fn columns(&self) -> usize {
        match &self.output {
            Output::Term(term) => term
                .size_checked()
                .map(|(_, cols)| cols as usize)
                .filter(|cols| *cols > 0)
                .unwrap_or(PROGRESS_COLUMNS),
            Output::Capture(_) => PROGRESS_COLUMNS,
        }
    }

    fn elapsed(&self) -> String {
        format!("{:.1}s", self.start.elapsed().as_secs_f64())
    }

    /// Plain line used when output is not a terminal.
    fn line(&self) -> String {
        let percent = left_pad(&format!("{:.1}%", self.percent()), PROGRESS_PER_LEN, ' ');
        let elapsed = left_pad(&self.elapsed(), PROGRESS_EL_LEN, ' ');
        format!(
            "{}{} {} {}/{} {}",
            self.prefix,
            self.name,
            percent,
            filesize(self.current as f64),
            filesize(self.total as f64),
            elapsed
        )
    }

    fn frame(&self, columns: usize) -> Frame {
        let progress = self.percent();
        let sizes = left_pad(
            &format!(
                "{}/{}",
                filesize(self.current as f64),
                filesize(self.total as f64)
            ),
            PROGRESS_SIZE_LEN,
            ' ',
        );
        let percent = left_pad(&format!("{progress:.1}%"), PROGRESS_PER_LEN, ' ');
        let elapsed = left_pad(&self.elapsed(), PROGRESS_EL_LEN, ' ');
        let rate = left_pad(
            &format!("{}/s", filesize(self.rate.rate())),
            PROGRESS_RATE_LEN,
            ' ',
        );
        let server = self
            .peer
            .as_deref()
            .and_then(|peer| peer.split('.').next())
            .filter(|label| !label.is_empty())
            .unwrap_or("N/A");
        let server = right_pad(server, PROGRESS_SERVER_LEN, ' ');

        let fixed: usize = [&self.prefix, &percent, &sizes, &server, &rate, &elapsed]
            .iter()
            .map(|s| s.chars().count())
            .sum::<usize>()
            + PROGRESS_SEPARATORS;
        let available = columns.saturating_sub(2).saturating_sub(fixed);
        let name_width = (available / 2).saturating_sub(1);
        let name = right_pad(&self.name, self.name_max.min(name_width), ' ');
        let name = shorten(&name, name_width);

        let bar = available.saturating_sub(name.chars().count());
        let done = ((bar as f64) * progress / 100.0).floor() as usize;
        let done = done.min(bar);
        Frame {
            prefix: self.prefix.clone(),
            name,
            done: "#".repeat(done),
            remain: "-".repeat(bar - done),
            percent,
            sizes,
            server,
            rate,
            elapsed,
        }
    }

    fn write_line(&self, line: &str) {
        match &self.output {
            Output::Term(term) => {
                let _ = term.write_line(line);
            }
            Output::Capture(buffer) => {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.extend_from_slice(line.as_bytes());
                    buffer.push(b'\n');
                }
            }
        }
    }
}

/// Returns the captured progress lines.
pub fn captured_lines(buffer: &SharedBuffer) -> Vec<String> {
    buffer
        .lock()
        .map(|buffer| {
            String::from_utf8_lossy(&buffer)
                .lines()
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
