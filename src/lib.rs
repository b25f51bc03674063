//! Find bad sectors on a block device.
//!
//! The device is read front to back in fixed-size blocks. Blocks that fail to
//! read are reported with their index, the scan then continues past them,
//! optionally skipping further blocks, until the device ends.

pub mod cli;
pub mod conf;
pub mod error;
pub mod io;
pub mod lsblk;
pub mod progress;
pub mod scan;

pub use crate::error::ScanError;
