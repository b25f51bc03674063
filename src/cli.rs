use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use indicatif::ProgressDrawTarget;

use crate::conf::{AConf, Conf};
use crate::io::dev::{BlockDevice, FileDevice};
use crate::io::sim::SimDevice;
use crate::lsblk::Lsblk;
use crate::scan::Scanner;

#[derive(Parser, Debug)]
#[command(name = "fsec")]
#[command(version, about = "Find bad sectors on a block device", long_about = None)]
pub struct Args {
    /// device node or image file to scan
    #[arg(long, required_unless_present_any = ["list", "simulate"])]
    pub device: Option<PathBuf>,

    /// bytes read in one go, bad blocks are reported in this unit
    #[arg(long, default_value_t = 512)]
    pub block_size: u32,

    /// blocks to skip after a failed read
    #[arg(long = "skip", default_value_t = 0)]
    pub skip: u32,

    /// bypass the page cache (O_DIRECT)
    #[arg(long, default_value_t = false)]
    pub direct: bool,

    /// failed reads in a row without forward movement before giving up
    #[arg(long, default_value_t = 256)]
    pub max_stalls: u32,

    /// scan an in-memory device of this many bytes instead of --device
    #[arg(long, value_name = "BYTES", conflicts_with = "device")]
    pub simulate: Option<u64>,

    /// list block devices and exit
    #[arg(long, default_value_t = false)]
    pub list: bool,

    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    pub fn conf(&self) -> Conf {
        let dev_path = match (&self.device, self.simulate) {
            (Some(path), _) => path.clone(),
            (None, Some(size)) => PathBuf::from(format!("<simulated {} bytes>", size)),
            (None, None) => PathBuf::new(),
        };
        let mut conf = Conf::new(dev_path);
        conf.block_size = self.block_size;
        conf.skip_blocks = self.skip;
        conf.direct = self.direct;
        conf.max_stalls = self.max_stalls;
        conf
    }
}

/// Run the tool and return the process exit code.
///
/// 0 when the scan reached the end of the device, even if blocks failed.
/// 1 for configuration, open, close and output failures, 2 for a stalled scan.
/// The progress line is drawn to `target`, messages go to `out`.
pub fn run<W: Write>(args: &Args, mut out: W, target: ProgressDrawTarget) -> i32 {
    match execute(args, &mut out, target) {
        Ok(code) => code,
        Err(e) => {
            if let Err(write_err) = writeln!(out, "{:#}", e) {
                // the status stream itself is gone, keep the reason in the log
                tracing::error!(error = %write_err, "{:#}", e);
            }
            1
        }
    }
}

fn execute<W: Write>(
    args: &Args,
    out: &mut W,
    target: ProgressDrawTarget,
) -> anyhow::Result<i32> {
    if args.list {
        let lsblk = Lsblk::retrieve().context("Failed to list block devices")?;
        lsblk.print(out)?;
        return Ok(0);
    }

    let conf: AConf = Arc::new(args.conf());
    conf.validate()?;

    match args.simulate {
        Some(size) => scan(conf, SimDevice::new(size), out, target),
        None => {
            let dev_path: Arc<Path> = Arc::from(conf.dev_path.as_path());
            let device = FileDevice::open(dev_path, conf.direct)?;
            scan(conf, device, out, target)
        }
    }
}

fn scan<D: BlockDevice, W: Write>(
    conf: AConf,
    device: D,
    out: &mut W,
    target: ProgressDrawTarget,
) -> anyhow::Result<i32> {
    let report = Scanner::new(conf, out)
        .with_draw_target(target)
        .run(device)?;
    Ok(report.exit_code())
}
