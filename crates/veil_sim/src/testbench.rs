//! Testbench drivers for the symbolic simulator.

use veil_common::BitRange;

use crate::error::SimError;
use crate::simulator::Simulator;

/// Drives a circuit's inputs across one or more clock cycles.
///
/// A testbench decides which inputs carry secrets, public data and
/// masks, allocates them, and steps the simulator; everything else —
/// emission, ledgers, the run program — falls out of the simulator.
pub trait Testbench {
    /// Runs the whole stimulus against the simulator.
    fn drive(&mut self, sim: &mut Simulator<'_>) -> Result<(), SimError>;
}

/// One shared value spread over a group of share ports.
///
/// A group of `k` ports describes one secret or data word with `k`
/// shares: share `i` is assigned to port `i`. All ports of a group
/// must have the same width.
#[derive(Clone, Debug)]
pub struct PortGroup {
    /// The share ports, share 0 first.
    pub ports: Vec<String>,
}

/// A port-name-driven testbench.
///
/// On the first cycle, every secret and data group is allocated and
/// its shares are assigned to the named ports; inputs then carry
/// forward on their own. Mask ports receive freshly allocated masks
/// on every cycle.
#[derive(Clone, Debug)]
pub struct PortTestbench {
    /// Number of clock cycles to unroll.
    pub cycles: u32,
    /// Secret share groups.
    pub secrets: Vec<PortGroup>,
    /// Public data share groups.
    pub data: Vec<PortGroup>,
    /// Ports fed with fresh masks each cycle.
    pub masks: Vec<String>,
}

impl PortTestbench {
    fn allocate_groups(
        sim: &mut Simulator<'_>,
        groups: &[PortGroup],
        is_secret: bool,
    ) -> Result<(), SimError> {
        let mut base = 0u32;
        for group in groups {
            let width = sim.bus_width(&group.ports[0])? as u32;
            for port in &group.ports[1..] {
                let other = sim.bus_width(port)? as u32;
                if other != width {
                    return Err(SimError::WidthMismatch {
                        name: port.clone(),
                        expected: width as usize,
                        got: other as usize,
                    });
                }
            }
            let range = BitRange::new(base + width - 1, base);
            if is_secret {
                sim.allocate_secrets(range, group.ports.len())?;
            } else {
                sim.allocate_data(range, group.ports.len())?;
            }
            for (share, port) in group.ports.iter().enumerate() {
                let values = if is_secret {
                    sim.secrets_share(range, share)?
                } else {
                    sim.data_share(range, share)?
                };
                sim.assign(port, &values)?;
            }
            base += width;
        }
        Ok(())
    }
}

impl Testbench for PortTestbench {
    fn drive(&mut self, sim: &mut Simulator<'_>) -> Result<(), SimError> {
        let mut mask_base = 0u32;
        for cycle in 0..self.cycles {
            sim.prepare_cycle();
            if cycle == 0 {
                Self::allocate_groups(sim, &self.secrets, true)?;
                Self::allocate_groups(sim, &self.data, false)?;
            }
            for port in &self.masks {
                let width = sim.bus_width(port)? as u32;
                let range = BitRange::new(mask_base + width - 1, mask_base);
                sim.allocate_masks(range)?;
                let values = sim.masks(range)?;
                sim.assign(port, &values)?;
                mask_base += width;
            }
            sim.step_cycle()?;
        }
        Ok(())
    }
}
