use std::io;
use std::ops::Range;

use super::dev::BlockDevice;

/// What the simulated hardware does with its position after a failed read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AfterFailure {
    /// moves past the requested range, like a drive that reseeks on its own
    Advance,
    /// stays at the start of the failed read
    Freeze,
}

/// In-memory device with injectable bad areas, for tests and `--simulate`.
pub struct SimDevice {
    size: u64,
    pos: u64,
    bad: Vec<Range<u64>>,
    after_failure: AfterFailure,
    refuse_seek: bool,
    report_size: bool,
    fail_close: bool,
    reads: u64,
}

impl SimDevice {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            pos: 0,
            bad: Vec::new(),
            after_failure: AfterFailure::Advance,
            refuse_seek: false,
            report_size: true,
            fail_close: false,
            reads: 0,
        }
    }

    /// any read touching `range` fails with EIO
    pub fn fail_bytes(mut self, range: Range<u64>) -> Self {
        self.bad.push(range);
        self
    }

    pub fn fail_block(self, block: u64, block_size: u32) -> Self {
        let start = block * block_size as u64;
        self.fail_bytes(start..start + block_size as u64)
    }

    pub fn after_failure(mut self, behavior: AfterFailure) -> Self {
        self.after_failure = behavior;
        self
    }

    /// every seek fails with ESPIPE
    pub fn refuse_seek(mut self) -> Self {
        self.refuse_seek = true;
        self
    }

    pub fn unknown_size(mut self) -> Self {
        self.report_size = false;
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn is_bad(&self, range: &Range<u64>) -> bool {
        self.bad
            .iter()
            .any(|b| b.start < range.end && range.start < b.end)
    }
}

impl BlockDevice for SimDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        if self.pos >= self.size {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(self.size - self.pos);
        let range = self.pos..self.pos + n;
        if self.is_bad(&range) {
            if self.after_failure == AfterFailure::Advance {
                self.pos = range.end;
            }
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        for b in &mut buf[..n as usize] {
            *b = 0;
        }
        self.pos = range.end;
        Ok(n as usize)
    }

    fn seek_relative(&mut self, delta: i64) -> io::Result<u64> {
        if self.refuse_seek {
            return Err(io::Error::from_raw_os_error(libc::ESPIPE));
        }
        let target = self.pos as i128 + delta as i128;
        if target < 0 || target > u64::MAX as i128 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    fn size(&mut self) -> Option<u64> {
        if self.report_size {
            Some(self.size)
        } else {
            None
        }
    }

    fn close(self) -> io::Result<()> {
        if self.fail_close {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        Ok(())
    }
}
