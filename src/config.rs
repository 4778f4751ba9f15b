//! Switch configuration files.
//!
//! ```text
//! 5
//! r-0 1
//! r-1 2
//! rr-0-1 T
//! ```
//! The first line is the bridge id. Each following line names an interface and either `T` (trunk)
//! or the VLAN id of an access port. Port ids follow line order, starting at 0.

use std::{collections::HashSet, path::Path, sync::OnceLock};

use regex::Regex;

use crate::{
    error::{Error, Result},
    network::{device::switch::VlanMode, ethernet::vlan},
};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PortConfig {
    pub name: String,
    pub mode: VlanMode,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SwitchConfig {
    pub bridge_id: u64,
    pub ports: Vec<PortConfig>,
}

fn port_line() -> &'static Regex {
    static PORT_LINE: OnceLock<Regex> = OnceLock::new();
    PORT_LINE.get_or_init(|| {
        Regex::new(r"^(?P<name>\S+)\s+(?P<mode>T|\d+)$").expect("port line pattern is valid")
    })
}

impl SwitchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<SwitchConfig> {
        let text = std::fs::read_to_string(path)?;
        SwitchConfig::parse(&text)
    }

    /// Parses a configuration. Any malformed or inconsistent line is an error; nothing is defaulted.
    pub fn parse(text: &str) -> Result<SwitchConfig> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let Some((line_no, id_line)) = lines.next() else {
            return Err(Error::config(1, "missing bridge id"));
        };
        let bridge_id = id_line
            .parse::<u64>()
            .map_err(|_| Error::config(line_no, format!("invalid bridge id '{}'", id_line)))?;

        let mut ports = Vec::new();
        let mut names = HashSet::new();

        for (line_no, line) in lines {
            let Some(caps) = port_line().captures(line) else {
                return Err(Error::config(
                    line_no,
                    format!("expected '<interface> <T|vlan>', found '{}'", line),
                ));
            };

            let name = caps["name"].to_string();
            if !names.insert(name.clone()) {
                return Err(Error::config(
                    line_no,
                    format!("duplicate interface '{}'", name),
                ));
            }

            let mode = match &caps["mode"] {
                "T" => VlanMode::Trunk,
                vlan_id => {
                    let vlan_id = vlan_id
                        .parse::<u16>()
                        .ok()
                        .and_then(|v| vlan::validate(v).ok())
                        .ok_or_else(|| {
                            Error::config(line_no, format!("invalid VLAN id '{}'", vlan_id))
                        })?;
                    VlanMode::Access(vlan_id)
                }
            };

            ports.push(PortConfig { name, mode });
        }

        if ports.is_empty() {
            return Err(Error::config(line_no, "no ports configured"));
        }

        Ok(SwitchConfig { bridge_id, ports })
    }
}

/// A cable between two bridges, each end given as `(bridge index, port id)`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LinkSpec {
    pub a: (usize, usize),
    pub b: (usize, usize),
}

fn link_spec() -> &'static Regex {
    static LINK_SPEC: OnceLock<Regex> = OnceLock::new();
    LINK_SPEC.get_or_init(|| {
        Regex::new(r"^(\d+):(\d+)-(\d+):(\d+)$").expect("link pattern is valid")
    })
}

impl std::str::FromStr for LinkSpec {
    type Err = Error;

    /// Parses `<bridge>:<port>-<bridge>:<port>`, e.g. `0:1-1:1`.
    fn from_str(s: &str) -> Result<LinkSpec> {
        let caps = link_spec()
            .captures(s.trim())
            .ok_or_else(|| Error::InvalidLink(s.to_string()))?;

        let field = |i: usize| {
            caps[i]
                .parse::<usize>()
                .map_err(|_| Error::InvalidLink(s.to_string()))
        };

        Ok(LinkSpec {
            a: (field(1)?, field(2)?),
            b: (field(3)?, field(4)?),
        })
    }
}
