use std::io::Write;
use std::process::Command;

use anyhow::ensure;
use serde_derive::*;

#[derive(Deserialize,Debug)]
pub struct Lsblk {
    pub blockdevices: Vec<LsblkBlockDevice>,
}

#[derive(Deserialize,Debug)]
pub struct LsblkBlockDevice {
    pub name: String,
    pub size: String,
    pub ro: bool,
    pub r#type: String,
    pub mountpoint: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub children: Vec<LsblkBlockDevice>,
}

impl Lsblk {
    pub fn retrieve() -> anyhow::Result<Self> {
        let result = Command::new("lsblk")
            .arg("-Jo")
            .arg("name,size,ro,type,mountpoint,model")
            .output()?;

        ensure!(result.status.success(),"lsblk error code {:?}",result.status.code());
        Self::parse(&result.stdout[..])
    }

    pub fn parse(json: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }

    /// one line per device, partitions indented below their disk
    pub fn print(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "{:<16} {:>8} {:<6} {:<3} MODEL", "DEVICE", "SIZE", "TYPE", "RO")?;
        for dev in &self.blockdevices {
            dev.print(out, 0)?;
        }
        Ok(())
    }
}

impl LsblkBlockDevice {
    fn print(&self, out: &mut impl Write, depth: usize) -> std::io::Result<()> {
        let path = format!("{}/dev/{}", "  ".repeat(depth), self.name);
        writeln!(
            out,
            "{:<16} {:>8} {:<6} {:<3} {}",
            path,
            self.size,
            self.r#type,
            if self.ro { "yes" } else { "no" },
            self.model.as_deref().unwrap_or("").trim(),
        )?;
        for child in &self.children {
            child.print(out, depth + 1)?;
        }
        Ok(())
    }
}

#[test]
fn test_parse() {
    let json = br#"{"blockdevices": [
        {"name":"sda", "size":"931.5G", "ro":false, "type":"disk", "mountpoint":null, "model":"WDC WD10EZEX-08W",
         "children": [
            {"name":"sda1", "size":"931.5G", "ro":false, "type":"part", "mountpoint":"/data", "model":null}
         ]},
        {"name":"sr0", "size":"1024M", "ro":true, "type":"rom", "mountpoint":null, "model":"DVD-RW"}
    ]}"#;
    let lsblk = Lsblk::parse(json).unwrap();
    assert_eq!(lsblk.blockdevices.len(),2);
    assert_eq!(lsblk.blockdevices[0].children[0].mountpoint.as_deref(),Some("/data"));

    let mut out = Vec::new();
    lsblk.print(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("/dev/sda "));
    assert!(out.contains("  /dev/sda1"));
    assert!(out.lines().any(|l| l.starts_with("/dev/sr0") && l.contains("yes")));
}
