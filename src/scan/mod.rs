use std::io::Write;

use indicatif::ProgressDrawTarget;

use crate::conf::AConf;
use crate::error::Result;
use crate::io::create_buf;
use crate::io::dev::BlockDevice;
use crate::progress::dev::ScanState;
use crate::progress::Progress;

pub mod recovery;
pub mod summary;

pub use self::summary::{ScanOutcome, ScanReport};

/// Sequential bad block scan over one device.
///
/// Reads the device front to back in `block_size` units until a read returns
/// nothing. Failed reads are counted and recovered from, they never stop the
/// scan. Status lines go to `out`.
pub struct Scanner<W: Write> {
    conf: AConf,
    progress: Progress<W>,
    state: ScanState,
    failures: Vec<crate::ScanError>,
}

impl<W: Write> Scanner<W> {
    pub fn new(conf: AConf, out: W) -> Self {
        let step = conf.progress_step;
        Self {
            conf,
            progress: Progress::new(out, step),
            state: ScanState::default(),
            failures: Vec::new(),
        }
    }

    /// Where the live progress line is drawn, hidden unless set.
    pub fn with_draw_target(mut self, target: ProgressDrawTarget) -> Self {
        self.progress.set_draw_target(target);
        self
    }

    /// Scan `device` to its end and close it.
    ///
    /// Only configuration errors and a broken status output are returned as
    /// `Err`; everything the device does wrong ends up in the report.
    pub fn run<D: BlockDevice>(mut self, mut device: D) -> Result<ScanReport> {
        self.conf.validate()?;
        self.progress.message(format_args!(
            "Device: {}, block size {}, skip {} blocks",
            self.conf.dev_path.display(),
            self.conf.block_size,
            self.conf.skip_blocks
        ))?;

        let total = device.size().unwrap_or(0);
        self.state = ScanState::new(total, device.tell().unwrap_or(0));
        tracing::info!(
            device = %self.conf.dev_path.display(),
            block_size = self.conf.block_size,
            skip_blocks = self.conf.skip_blocks,
            total,
            "scan started"
        );
        self.progress.start(&self.state);

        let mut buf = create_buf(self.conf.block_size as usize);
        let outcome = loop {
            let before = self.state.byte_position;
            match device.read(&mut buf) {
                Ok(0) => break ScanOutcome::Finished,
                Ok(n) => {
                    if n < buf.len() {
                        tracing::debug!(
                            block = self.state.block_index,
                            bytes = n,
                            "short final block"
                        );
                    }
                    self.state.block_index += 1;
                    self.state.consecutive_stalls = 0;
                }
                Err(source) => {
                    if let Some(outcome) = self.recover(&mut device, before, source)? {
                        break outcome;
                    }
                }
            }
            if let Ok(pos) = device.tell() {
                self.state.byte_position = pos;
            }
            self.progress.update(&mut self.state);
        };

        self.progress.finish(&mut self.state)?;
        self.summarize(device, outcome)
    }
}
