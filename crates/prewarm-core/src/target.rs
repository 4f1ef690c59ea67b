//! Target description.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    X64,
    Arm64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X64 => f.write_str("x64"),
            Arch::Arm64 => f.write_str("arm64"),
        }
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Arch, String> {
        match s {
            "x64" => Ok(Arch::X64),
            "arm64" => Ok(Arch::Arm64),
            other => Err(format!("unknown architecture `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    pub arch: Arch,
}

impl Target {
    pub const fn new(arch: Arch) -> Target {
        Target { arch }
    }

    pub const fn pointer_size(&self) -> u32 {
        8
    }
}

impl Default for Target {
    fn default() -> Target {
        Target::new(Arch::X64)
    }
}
