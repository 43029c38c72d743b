//! SmartVIO rail solving and the negotiation run.
//!
//! A rail is shared by every port named in its membership mask, and each
//! present port brings an ordered table of acceptable VIO ranges. Range
//! index is operator preference, not magnitude: mode 0 across all ports is
//! tried before any port's mode 1, so a rail never mixes one module's
//! primary range with another's fallback. Within the first feasible mode
//! the rail settles on the lowest common voltage.

use crate::bus::{I2cBus, SyzygyBus};
use crate::dna::{AttributeFlags, StringTable, VioRange, MAX_VIO_RANGES};
use crate::error::Result;

/// Most ports a single SmartVIO configuration can carry.
pub const MAX_PORTS: usize = 8;

/// Most rails a single SmartVIO configuration can carry.
pub const MAX_GROUPS: usize = 4;

/// The exact VIO an LVDS-attribute module requires, in tenths of a volt.
pub const LVDS_VIO: u16 = 250;

/// One SmartVIO port: its static wiring plus whatever the last DNA read
/// learned about the attached module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Port {
    /// I2C address of the module MCU; `None` for bus-less members such as
    /// the FPGA side of a rail.
    pub addr: Option<u8>,
    /// Whether a module answered the probe this run.
    pub present: bool,
    /// Rail this port belongs to, informational; rail membership is decided
    /// by the group masks.
    pub group: u8,
    /// Whether this port shares a connector with its neighbour.
    pub doublewide_mate: bool,
    pub attr: AttributeFlags,
    /// Leading entries of `ranges` that are in use.
    pub range_count: u8,
    pub ranges: [VioRange; MAX_VIO_RANGES],
    /// String locators from the decoded DNA, once a module has been read.
    pub strings: Option<StringTable>,
}

impl Port {
    /// A port wired to a pluggable module at `addr`.
    pub fn peripheral(addr: u8, group: u8, doublewide_mate: bool) -> Self {
        Port {
            addr: Some(addr),
            group,
            doublewide_mate,
            ..Default::default()
        }
    }

    /// A bus-less, always-present rail member with a fixed operating range,
    /// e.g. the FPGA bank a rail also feeds.
    pub fn fixed(group: u8, range: VioRange, doublewide_mate: bool) -> Self {
        let mut ranges = [VioRange::EMPTY; MAX_VIO_RANGES];
        ranges[0] = range;
        Port {
            addr: None,
            present: true,
            group,
            doublewide_mate,
            range_count: 1,
            ranges,
            ..Default::default()
        }
    }
}

/// Static SmartVIO wiring of one host board.
///
/// Constructed once, passed by reference into every negotiation run; the
/// run never mutates it, so independent bus segments can share one config.
#[derive(Debug, Clone)]
pub struct SvioConfig {
    pub ports: heapless::Vec<Port, MAX_PORTS>,
    /// Authoritative rail membership, one bitmask over port indices per rail.
    pub group_masks: heapless::Vec<u16, MAX_GROUPS>,
}

impl SvioConfig {
    /// The SYZYGY Brain 1 board: rail 1 feeds the FPGA and one port, rail 2
    /// feeds the FPGA and three doublewide-mated ports. FPGA banks accept
    /// 1.2 V to 3.3 V.
    pub fn brain1() -> Self {
        let fpga = VioRange::new(120, 330);
        let mut ports = heapless::Vec::new();
        let _ = ports.push(Port::fixed(0, fpga, false));
        let _ = ports.push(Port::peripheral(0x30, 0, false));
        let _ = ports.push(Port::fixed(1, fpga, true));
        let _ = ports.push(Port::peripheral(0x31, 1, true));
        let _ = ports.push(Port::peripheral(0x32, 1, true));
        let _ = ports.push(Port::peripheral(0x33, 1, true));

        let mut group_masks = heapless::Vec::new();
        let _ = group_masks.push(0x0003);
        let _ = group_masks.push(0x003C);

        SvioConfig { ports, group_masks }
    }
}

/// Outcome of one negotiation run. Built fresh from live bus reads and
/// discarded after use; nothing here persists between runs.
#[derive(Debug, Clone)]
pub struct Negotiation {
    /// Port state as decoded this run.
    pub ports: heapless::Vec<Port, MAX_PORTS>,
    /// One resolved voltage per rail, `None` where no common mode exists.
    /// A `None` rail must not be driven.
    pub rails: heapless::Vec<Option<u16>, MAX_GROUPS>,
}

fn rail_members(ports: &[Port], mask: u16) -> impl Iterator<Item = &Port> {
    // The mask is sixteen bits wide, so ports past index 15 can never be
    // rail members.
    ports
        .iter()
        .take(16)
        .enumerate()
        .filter_map(move |(i, p)| (mask & (1u16 << i) != 0 && p.present).then_some(p))
}

/// Solve one rail: the lowest voltage of the first mode index feasible
/// across every present member, or `None` when no mode is.
///
/// Absent ports are excluded from the solve while their mask bit still
/// reserves the slot. A rail with no present members has no solution.
pub fn solve_group(ports: &[Port], mask: u16) -> Option<u16> {
    if rail_members(ports, mask).next().is_none() {
        return None;
    }

    for mode in 0..MAX_VIO_RANGES {
        let mut window = VioRange::new(0, u16::MAX);
        let mut feasible = true;

        for port in rail_members(ports, mask) {
            if mode >= port.range_count as usize {
                feasible = false;
                break;
            }
            match window.intersect(port.ranges[mode]) {
                Some(w) => window = w,
                None => {
                    feasible = false;
                    break;
                }
            }
        }

        if feasible {
            return Some(window.min);
        }
    }
    None
}

impl<B: I2cBus> SyzygyBus<B> {
    /// Run one full SmartVIO negotiation: probe every configured port,
    /// decode the DNA of each present module, then solve every rail.
    ///
    /// Any transport or decode failure aborts the whole run; a partially
    /// negotiated voltage set is never returned.
    pub fn negotiate(&mut self, config: &SvioConfig) -> Result<Negotiation, B::Error> {
        let mut ports = config.ports.clone();

        for port in ports.iter_mut() {
            let Some(addr) = port.addr else { continue };

            port.present = self.probe(addr);
            if !port.present {
                continue;
            }

            let header = self.read_dna_header(addr)?;
            port.attr = header.attr;
            port.range_count = header.range_count;
            port.ranges = header.ranges;
            port.strings = Some(header.strings);

            if port.attr.lvds() {
                // LVDS signalling needs exactly 2.5 V; the advertised mode-0
                // range does not get a say.
                port.ranges[0] = VioRange::single(LVDS_VIO);
                if port.range_count == 0 {
                    port.range_count = 1;
                }
            }
        }

        let mut rails = heapless::Vec::new();
        for &mask in config.group_masks.iter() {
            let _ = rails.push(solve_group(&ports, mask));
        }

        Ok(Negotiation { ports, rails })
    }

    /// Fetch the identification strings of every present module, `None` for
    /// absent or bus-less ports. Expects port state from [`Self::negotiate`].
    pub fn read_identities(
        &mut self,
        ports: &[Port],
    ) -> Result<heapless::Vec<Option<crate::dna::PortIdentity>, MAX_PORTS>, B::Error> {
        let mut out = heapless::Vec::new();
        for port in ports.iter().take(MAX_PORTS) {
            let identity = match (port.addr, port.present, &port.strings) {
                (Some(addr), true, Some(strings)) => Some(self.read_identity(addr, strings)?),
                _ => None,
            };
            let _ = out.push(identity);
        }
        Ok(out)
    }
}
