use std::fmt;
use std::io::{self, Write};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use self::dev::ScanState;

pub mod dev;

/// `<bytes read>/<total bytes> <percent>%`, percent left out for unknown sizes
pub fn format_line(current: u64, total: u64) -> String {
    if total == 0 {
        return format!("{}/?", current);
    }
    let percent = (current as u128 * 100 / total as u128).min(100);
    format!("{}/{} {}%", current, total, percent)
}

fn style(total: u64) -> ProgressStyle {
    let template = if total == 0 { "{pos}/?" } else { "{pos}/{len} {percent}%" };
    ProgressStyle::with_template(template).expect("invalid progress template - this is a bug")
}

/// Single status line that is rewritten in place, drawn by an indicatif bar.
///
/// Messages written through [`Progress::message`] go to `out` above the
/// live line. When the draw target is hidden (stdout not a terminal) the
/// final report is written to `out` as plain text instead.
pub struct Progress<W: Write> {
    out: W,
    bar: ProgressBar,
    step: u64,
    live: bool,
}

impl<W: Write> Progress<W> {
    pub fn new(out: W, step: u64) -> Self {
        Self {
            out,
            bar: ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden()),
            step,
            live: false,
        }
    }

    pub fn set_draw_target(&mut self, target: ProgressDrawTarget) {
        self.bar.set_draw_target(target);
    }

    /// Size the bar once the device size is known, 0 for unknown.
    pub fn start(&mut self, state: &ScanState) {
        if state.total_size > 0 {
            self.bar.set_length(state.total_size);
        }
        self.bar.set_style(style(state.total_size));
        self.bar.set_position(state.byte_position);
        self.live = true;
    }

    /// Report if the position moved more than one step since the last report.
    pub fn update(&mut self, state: &mut ScanState) -> bool {
        if state.byte_position <= state.last_reported_position.saturating_add(self.step) {
            return false;
        }
        self.report(state);
        true
    }

    /// Unconditional last report, leaves the line finished.
    pub fn finish(&mut self, state: &mut ScanState) -> io::Result<()> {
        self.report(state);
        // abandon keeps the reported position, finish would jump to the length
        self.bar.abandon();
        self.live = false;
        if self.bar.is_hidden() {
            let line = format_line(state.last_reported_position, state.total_size);
            writeln!(self.out, "{}", line)?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn message(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let out = &mut self.out;
        let mut print = || -> io::Result<()> {
            out.write_fmt(args)?;
            out.write_all(b"\n")?;
            out.flush()
        };
        if self.live {
            self.bar.suspend(print)
        } else {
            print()
        }
    }

    fn report(&mut self, state: &mut ScanState) {
        let current = state.report_position();
        self.bar.set_position(current);
        state.last_reported_position = current;
        tracing::trace!(current, total = state.total_size, "progress");
    }
}
