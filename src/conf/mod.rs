use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, ScanError};

/// bytes of forward movement between two progress lines
pub const PROGRESS_STEP: u64 = 10_000_000;

/// largest block read in one go
pub const MAX_BLOCK_SIZE: u32 = 1 << 30;

/// sector size `O_DIRECT` reads have to be a multiple of
pub const DIRECT_ALIGN: u32 = 512;

pub struct Conf {
    pub dev_path: PathBuf,
    /// bytes read in one go, also the unit bad blocks are reported in
    pub block_size: u32,
    /// blocks to seek past after a failed read
    pub skip_blocks: u32,
    /// open with O_DIRECT so reads bypass the page cache
    pub direct: bool,
    /// consecutive failures without forward movement before giving up
    pub max_stalls: u32,
    pub progress_step: u64,
}

impl Conf {
    pub fn new(dev_path: impl Into<PathBuf>) -> Self {
        Self {
            dev_path: dev_path.into(),
            block_size: 512,
            skip_blocks: 0,
            direct: false,
            max_stalls: 256,
            progress_step: PROGRESS_STEP,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ScanError::Configuration("block size must be positive".into()));
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(ScanError::Configuration(format!(
                "block size {} exceeds the maximum of {} bytes",
                self.block_size, MAX_BLOCK_SIZE
            )));
        }
        if self.max_stalls == 0 {
            return Err(ScanError::Configuration("max stalls must be positive".into()));
        }
        if self.direct && self.block_size % DIRECT_ALIGN != 0 {
            return Err(ScanError::Configuration(format!(
                "block size {} is not a multiple of {} required for direct I/O",
                self.block_size, DIRECT_ALIGN
            )));
        }
        Ok(())
    }

    /// relative seek distance of one recovery skip
    pub fn skip_bytes(&self) -> i64 {
        (self.skip_blocks as i64).saturating_mul(self.block_size as i64)
    }
}

pub type AConf = Arc<Conf>;

pub fn get_test_config() -> AConf {
    Arc::new(Conf {
        dev_path: PathBuf::from("<test>"),
        block_size: 512,
        skip_blocks: 0,
        direct: false,
        max_stalls: 8,
        progress_step: PROGRESS_STEP,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(get_test_config().validate().is_ok());

        let mut conf = Conf::new("/dev/null");
        conf.block_size = 0;
        assert!(matches!(conf.validate(), Err(ScanError::Configuration(_))));

        let mut conf = Conf::new("/dev/null");
        conf.max_stalls = 0;
        assert!(conf.validate().is_err());
    }

    #[test]
    fn test_block_size_upper_bound() {
        let mut conf = Conf::new("/dev/null");
        conf.block_size = MAX_BLOCK_SIZE;
        assert!(conf.validate().is_ok());
        conf.block_size = MAX_BLOCK_SIZE + 1;
        assert!(matches!(conf.validate(), Err(ScanError::Configuration(_))));
        conf.block_size = u32::MAX;
        assert!(conf.validate().is_err());
    }

    #[test]
    fn test_direct_alignment() {
        let mut conf = Conf::new("/dev/null");
        conf.direct = true;
        conf.block_size = 4096;
        assert!(conf.validate().is_ok());
        conf.block_size = 1000;
        assert!(conf.validate().is_err());
    }

    #[test]
    fn test_skip_range() {
        let mut conf = Conf::new("/dev/null");
        conf.block_size = 4096;
        conf.skip_blocks = 16;
        assert_eq!(conf.skip_bytes(), 65536);

        // the largest valid skip still fits a relative seek
        conf.block_size = MAX_BLOCK_SIZE;
        conf.skip_blocks = u32::MAX;
        assert!(conf.validate().is_ok());
        assert_eq!(conf.skip_bytes(), (MAX_BLOCK_SIZE as i64) * (u32::MAX as i64));
        conf.block_size = u32::MAX;
        conf.skip_blocks = u32::MAX;
        assert_eq!(conf.skip_bytes(), i64::MAX);
    }
}
