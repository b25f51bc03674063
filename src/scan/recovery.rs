use std::io::{self, Write};

use crate::error::{Result, ScanError};
use crate::io::dev::BlockDevice;

use super::{ScanOutcome, Scanner};

impl<W: Write> Scanner<W> {
    /// Count a failed read and try to get past it.
    ///
    /// With `skip_blocks > 0` the device is moved forward by that many blocks.
    /// If the device ends up where it was before the read, it is stepped one
    /// block forward so a frozen position cannot loop forever; when even that
    /// fails `max_stalls` times in a row the scan gives up.
    pub(super) fn recover<D: BlockDevice>(
        &mut self,
        device: &mut D,
        before: u64,
        source: io::Error,
    ) -> Result<Option<ScanOutcome>> {
        let block = self.state.block_index;
        self.state.error_count += 1;
        self.progress.message(format_args!(" {} block: {}", block, source))?;
        tracing::warn!(block, error = %source, "read failed");
        self.failures.push(ScanError::Read { block, source });

        let mut counted = true;
        let skip = self.conf.skip_blocks;
        if skip > 0 {
            self.progress.message(format_args!(" skipping {} blocks", skip))?;
            match device.seek_relative(self.conf.skip_bytes()) {
                Ok(pos) => {
                    tracing::debug!(block, skip, pos, "skipped past failed block");
                    self.state.block_index += skip as u64;
                }
                Err(source) => {
                    self.progress.message(format_args!(" not seeking: {}", source))?;
                    tracing::warn!(block, error = %source, "skip failed");
                    self.failures.push(ScanError::Seek { block, source });
                    counted = false;
                }
            }
        }
        if counted {
            self.state.block_index += 1;
        }

        let moved = device.tell().map(|pos| pos > before).unwrap_or(false);
        if moved {
            self.state.consecutive_stalls = 0;
            return Ok(None);
        }
        self.step_over(device, block, counted)
    }

    fn step_over<D: BlockDevice>(
        &mut self,
        device: &mut D,
        block: u64,
        counted: bool,
    ) -> Result<Option<ScanOutcome>> {
        match device.seek_relative(self.conf.block_size as i64) {
            Ok(pos) => {
                tracing::debug!(block, pos, "device did not move after failure, stepped one block");
                if !counted {
                    self.state.block_index += 1;
                }
                self.state.consecutive_stalls = 0;
                Ok(None)
            }
            Err(source) => {
                self.state.consecutive_stalls += 1;
                let stalls = self.state.consecutive_stalls;
                tracing::debug!(block, stalls, error = %source, "device position stuck");
                if stalls < self.conf.max_stalls {
                    return Ok(None);
                }
                self.progress.message(format_args!(
                    " giving up: device position stuck after {} failed reads",
                    stalls
                ))?;
                tracing::error!(block, stalls, "scan stalled");
                Ok(Some(ScanOutcome::Stalled))
            }
        }
    }
}
