use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::IntoRawFd;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, ScanError};

/// What the scanner needs from a device: sequential reads, relative seeks
/// and a best-effort position.
///
/// After a failed `read` the position is undefined. Implementations may
/// have moved past the bad area or stayed where they were.
pub trait BlockDevice {
    /// Read up to `buf.len()` bytes at the current position. `Ok(0)` is end of device.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Move the position by `delta` bytes and return the new position.
    fn seek_relative(&mut self, delta: i64) -> io::Result<u64>;
    fn tell(&mut self) -> io::Result<u64>;
    /// Total size in bytes, `None` when it cannot be determined.
    fn size(&mut self) -> Option<u64>;
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// a device node or image file opened read-only
///
/// The descriptor is released when the value is dropped, so an unwinding
/// scan does not leak it. `close` exists to observe the close result.
pub struct FileDevice {
    pub dev_path: Arc<Path>,
    file: File,
    size: Option<u64>,
}

impl FileDevice {
    pub fn open(dev_path: Arc<Path>, direct: bool) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(false).create(false);
        if direct {
            options.custom_flags(direct_flag());
        }
        let mut file = options.open(&dev_path).map_err(|source| ScanError::Open {
            path: dev_path.to_path_buf(),
            source,
        })?;

        let size = match file.seek(SeekFrom::End(0)) {
            Ok(0) | Err(_) => None,
            Ok(n) => Some(n),
        };
        // character devices and pipes cannot seek; start wherever they are
        if size.is_some() {
            file.seek(SeekFrom::Start(0)).map_err(|source| ScanError::Open {
                path: dev_path.to_path_buf(),
                source,
            })?;
        }

        tracing::debug!(path = %dev_path.display(), ?size, direct, "device opened");
        Ok(Self {
            dev_path,
            file,
            size,
        })
    }
}

#[cfg(target_os = "linux")]
fn direct_flag() -> i32 {
    libc::O_DIRECT
}

#[cfg(not(target_os = "linux"))]
fn direct_flag() -> i32 {
    tracing::warn!("direct I/O is only supported on linux, using buffered reads");
    0
}

/// Read until `buf` is full or the source ends, retrying `EINTR`.
///
/// A block is only complete once it is full or the device ended, so a short
/// read in the middle of a device does not count as a block of its own.
fn fill_block<R: Read>(src: &mut R, mut buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while !buf.is_empty() {
        match src.read(buf) {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                buf = &mut buf[n..];
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl BlockDevice for FileDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        fill_block(&mut self.file, buf)
    }

    fn seek_relative(&mut self, delta: i64) -> io::Result<u64> {
        self.file.seek(SeekFrom::Current(delta))
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.file.seek(SeekFrom::Current(0))
    }

    fn size(&mut self) -> Option<u64> {
        self.size
    }

    fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: fd came from into_raw_fd, nothing else owns it
        if unsafe { libc::close(fd) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn image(len: usize) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_read_blocks() {
        let tmp = image(1300);
        let mut dev = FileDevice::open(Arc::from(tmp.path()), false).unwrap();
        assert_eq!(dev.size(), Some(1300));

        let mut buf = vec![0; 512];
        assert_eq!(dev.read(&mut buf).unwrap(), 512);
        assert_eq!(buf[1], 1);
        assert_eq!(dev.read(&mut buf).unwrap(), 512);
        assert_eq!(dev.tell().unwrap(), 1024);
        assert_eq!(dev.read(&mut buf).unwrap(), 276);
        assert_eq!(dev.read(&mut buf).unwrap(), 0);
        dev.close().unwrap();
    }

    #[test]
    fn test_seek_relative() {
        let tmp = image(4096);
        let mut dev = FileDevice::open(Arc::from(tmp.path()), false).unwrap();
        assert_eq!(dev.seek_relative(1024).unwrap(), 1024);
        assert_eq!(dev.seek_relative(-512).unwrap(), 512);
        assert!(dev.seek_relative(-4096).is_err());
        assert_eq!(dev.tell().unwrap(), 512);

        // past the end is allowed, reads then report end of device
        assert_eq!(dev.seek_relative(8192).unwrap(), 8704);
        let mut buf = vec![0; 512];
        assert_eq!(dev.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_empty_file_has_unknown_size() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = FileDevice::open(Arc::from(tmp.path()), false).unwrap();
        assert_eq!(dev.size(), None);
        let mut buf = vec![0; 512];
        assert_eq!(dev.read(&mut buf).unwrap(), 0);
    }

    /// hands out at most `chunk` bytes per call, interrupted before each
    struct Choppy {
        data: Vec<u8>,
        chunk: usize,
        interrupt: bool,
        fail_at: Option<usize>,
    }

    impl Read for Choppy {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::from_raw_os_error(libc::EINTR));
            }
            if self.fail_at.map_or(false, |at| self.data.len() <= at) {
                return Err(io::Error::from_raw_os_error(libc::EIO));
            }
            let n = buf.len().min(self.chunk).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn test_fill_block_retries_interrupts() {
        let mut src = Choppy {
            data: (0..1000).map(|i| i as u8).collect(),
            chunk: 100,
            interrupt: false,
            fail_at: None,
        };
        let mut buf = vec![0; 512];
        assert_eq!(fill_block(&mut src, &mut buf).unwrap(), 512);
        assert_eq!(buf[511], 255);
        assert_eq!(fill_block(&mut src, &mut buf).unwrap(), 488);
        assert_eq!(fill_block(&mut src, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_fill_block_fails_whole_block() {
        let mut src = Choppy {
            data: vec![0; 1000],
            chunk: 100,
            interrupt: false,
            fail_at: Some(700),
        };
        let mut buf = vec![0; 512];
        let e = fill_block(&mut src, &mut buf).unwrap_err();
        assert_eq!(e.raw_os_error(), Some(libc::EIO));
    }

    #[test]
    fn test_direct_read() {
        let tmp = image(8 * 4096);
        let mut dev = match FileDevice::open(Arc::from(tmp.path()), true) {
            Ok(dev) => dev,
            // tmpfs and some overlay filesystems refuse O_DIRECT
            Err(ScanError::Open { ref source, .. })
                if source.raw_os_error() == Some(libc::EINVAL) =>
            {
                return;
            }
            Err(e) => panic!("unexpected error {}", e),
        };
        let mut buf = crate::io::create_buf(4096);
        for _ in 0..8 {
            assert_eq!(dev.read(&mut buf).unwrap(), 4096);
        }
        assert_eq!(buf[1], 1);
        assert_eq!(dev.read(&mut buf).unwrap(), 0);
        dev.close().unwrap();
    }

    #[test]
    fn test_open_missing() {
        let path: Arc<Path> = Arc::from(Path::new("/nonexistent/fsec-device"));
        match FileDevice::open(path, false) {
            Err(ScanError::Open { path, source }) => {
                assert_eq!(path, Path::new("/nonexistent/fsec-device"));
                assert_eq!(source.kind(), ErrorKind::NotFound);
            }
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("opened a missing device"),
        }
    }
}
