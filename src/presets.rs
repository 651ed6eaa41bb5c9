//! Reference circuits assembled purely through [`Circuit::connect`].

use std::fmt;
use std::str::FromStr;

use crate::circuit::{Circuit, Component, ComponentId};
use crate::error::Result;

/// Built-in circuits selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Divider,
    Wheatstone,
    CurrentLoad,
    Ladder,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Divider,
        Preset::Wheatstone,
        Preset::CurrentLoad,
        Preset::Ladder,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Divider => "divider",
            Preset::Wheatstone => "wheatstone",
            Preset::CurrentLoad => "current-load",
            Preset::Ladder => "ladder",
        }
    }

    /// Build the circuit with its standard values. `sections` only affects the ladder.
    pub fn build(self, sections: usize) -> Result<Circuit> {
        match self {
            Preset::Divider => voltage_divider(5.0, 10.0, 10.0),
            Preset::Wheatstone => wheatstone_bridge(10.0, [1e3, 2e3, 2e3, 1e3], 500.0),
            Preset::CurrentLoad => current_source_load(1e-3, 4.7e3),
            Preset::Ladder => resistor_ladder(sections, 12.0, 1e3, 1e3),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown preset '{}'", s))
    }
}

/// Source across two series resistors, R2 to ground
pub fn voltage_divider(volts: f64, r1: f64, r2: f64) -> Result<Circuit> {
    let mut circuit = Circuit::new("Voltage divider");
    let v1 = circuit.add_component(Component::voltage_source("V1", volts));
    let ra = circuit.add_component(Component::resistor("R1", r1)?);
    let rb = circuit.add_component(Component::resistor("R2", r2)?);
    let gnd = circuit.add_component(Component::ground("GND"));

    circuit.connect(v1, 1, ra, 0)?;
    circuit.connect(ra, 1, rb, 0)?;
    circuit.connect(rb, 1, gnd, 0)?;
    circuit.connect(v1, 0, gnd, 0)?;
    Ok(circuit)
}

/// Two dividers fed by one source, with `bridge` between their midpoints.
///
/// `arms` is R1 (top left), R2 (bottom left), R3 (top right), R4 (bottom right).
pub fn wheatstone_bridge(volts: f64, arms: [f64; 4], bridge: f64) -> Result<Circuit> {
    let mut circuit = Circuit::new("Wheatstone bridge");
    let v1 = circuit.add_component(Component::voltage_source("V1", volts));
    let gnd = circuit.add_component(Component::ground("GND"));
    let mut r = [ComponentId::new(0); 4];
    for (i, &resistance) in arms.iter().enumerate() {
        r[i] = circuit.add_component(Component::resistor(format!("R{}", i + 1), resistance)?);
    }
    let r5 = circuit.add_component(Component::resistor("R5", bridge)?);

    circuit.connect(v1, 0, gnd, 0)?;
    // Top rail
    circuit.connect(v1, 1, r[0], 0)?;
    circuit.connect(v1, 1, r[2], 0)?;
    // Midpoints
    circuit.connect(r[0], 1, r[1], 0)?;
    circuit.connect(r[2], 1, r[3], 0)?;
    // Bottom rail
    circuit.connect(r[1], 1, gnd, 0)?;
    circuit.connect(r[3], 1, gnd, 0)?;
    // Bridge
    circuit.connect(r5, 0, r[0], 1)?;
    circuit.connect(r5, 1, r[2], 1)?;
    Ok(circuit)
}

/// Current source driving a single grounded load
pub fn current_source_load(current: f64, load: f64) -> Result<Circuit> {
    let mut circuit = Circuit::new("Current source load");
    let i1 = circuit.add_component(Component::current_source("I1", current));
    let rl = circuit.add_component(Component::resistor("RL", load)?);
    let gnd = circuit.add_component(Component::ground("GND"));

    circuit.connect(i1, 0, gnd, 0)?;
    circuit.connect(rl, 0, gnd, 0)?;
    circuit.connect(i1, 1, rl, 1)?;
    Ok(circuit)
}

/// Source followed by `sections` series/shunt resistor pairs
pub fn resistor_ladder(sections: usize, volts: f64, series: f64, shunt: f64) -> Result<Circuit> {
    let mut circuit = Circuit::new(format!("{}-section resistor ladder", sections));
    let v1 = circuit.add_component(Component::voltage_source("V1", volts));
    let gnd = circuit.add_component(Component::ground("GND"));
    circuit.connect(v1, 0, gnd, 0)?;

    let mut tap = (v1, 1);
    for k in 1..=sections {
        let rs = circuit.add_component(Component::resistor(format!("RS{}", k), series)?);
        let rp = circuit.add_component(Component::resistor(format!("RP{}", k), shunt)?);
        circuit.connect(rs, 0, tap.0, tap.1)?;
        circuit.connect(rp, 0, rs, 1)?;
        circuit.connect(rp, 1, gnd, 0)?;
        tap = (rs, 1);
    }

    Ok(circuit)
}
