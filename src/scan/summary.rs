use std::io::Write;

use size_format::SizeFormatterBinary;

use crate::error::{Result, ScanError};
use crate::io::dev::BlockDevice;
use crate::progress::dev::ScanState;

use super::Scanner;

/// failed block indices listed in the summary before cutting off
const LISTED_BLOCKS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScanOutcome {
    /// reached the end of the device
    Finished,
    /// the device position stopped moving after failures
    Stalled,
}

#[derive(Debug)]
pub struct ScanReport {
    pub state: ScanState,
    pub outcome: ScanOutcome,
    /// per-block read and seek failures, in the order they happened
    pub failures: Vec<ScanError>,
    pub close_error: Option<ScanError>,
}

impl ScanReport {
    pub fn blocks(&self) -> u64 {
        self.state.block_index
    }

    pub fn errors(&self) -> u64 {
        self.state.error_count
    }

    pub fn failed_blocks(&self) -> Vec<u64> {
        read_failures(&self.failures)
    }

    /// Read errors are results, not tool failures; only a device that
    /// could not be closed or a stalled scan is.
    pub fn exit_code(&self) -> i32 {
        if self.close_error.is_some() {
            1
        } else if self.outcome == ScanOutcome::Stalled {
            2
        } else {
            0
        }
    }
}

fn read_failures(failures: &[ScanError]) -> Vec<u64> {
    failures
        .iter()
        .filter_map(|f| match f {
            ScanError::Read { block, .. } => Some(*block),
            _ => None,
        })
        .collect()
}

pub fn format_blocks(blocks: &[u64]) -> String {
    let mut list = blocks
        .iter()
        .take(LISTED_BLOCKS)
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if blocks.len() > LISTED_BLOCKS {
        list.push_str(&format!(" ... ({} more)", blocks.len() - LISTED_BLOCKS));
    }
    list
}

impl<W: Write> Scanner<W> {
    pub(super) fn summarize<D: BlockDevice>(
        mut self,
        device: D,
        outcome: ScanOutcome,
    ) -> Result<ScanReport> {
        let state = &self.state;
        self.progress
            .message(format_args!(" blocks scanned: {}", state.block_index))?;
        self.progress
            .message(format_args!(" errors: {}", state.error_count))?;
        let failed = read_failures(&self.failures);
        if !failed.is_empty() {
            self.progress
                .message(format_args!(" failed blocks: {}", format_blocks(&failed)))?;
        }
        self.progress.message(format_args!(
            " position: {} bytes ({}B)",
            state.byte_position,
            SizeFormatterBinary::new(state.byte_position)
        ))?;

        let close_error = match device.close() {
            Ok(()) => {
                self.progress.message(format_args!("Device closed"))?;
                None
            }
            Err(source) => {
                self.progress
                    .message(format_args!("Unable to close device: {}", source))?;
                tracing::error!(error = %source, "close failed");
                Some(ScanError::Close { source })
            }
        };

        tracing::info!(
            blocks = self.state.block_index,
            errors = self.state.error_count,
            ?outcome,
            "scan finished"
        );
        Ok(ScanReport {
            state: self.state,
            outcome,
            failures: self.failures,
            close_error,
        })
    }
}
