//! End-to-end tests: netlist → symbolic unrolling → run program →
//! bit-sliced execution.

use rand::rngs::StdRng;
use rand::SeedableRng;

use veil_common::{BitRange, Word};
use veil_netlist::Netlist;
use veil_sim::{PortGroup, PortTestbench, RunProgram, Simulator, Testbench};

const XOR_JSON: &str = r#"{
    "modules": {
        "top": {
            "ports": {
                "a": {"direction": "input", "bits": [2]},
                "b": {"direction": "input", "bits": [3]},
                "y": {"direction": "output", "bits": [4]}
            },
            "cells": {
                "g0": {"type": "$xor", "connections": {"A": [2], "B": [3], "Y": [4]}}
            },
            "netnames": {"y": {"bits": [4]}}
        }
    }
}"#;

const NOT_JSON: &str = r#"{
    "modules": {
        "top": {
            "ports": {
                "a": {"direction": "input", "bits": [2]},
                "y": {"direction": "output", "bits": [3]}
            },
            "cells": {
                "g0": {"type": "$not", "connections": {"A": [2], "Y": [3]}}
            },
            "netnames": {"y": {"bits": [3]}}
        }
    }
}"#;

const DFF_XOR_JSON: &str = r#"{
    "modules": {
        "top": {
            "ports": {
                "clk": {"direction": "input", "bits": [2]},
                "a": {"direction": "input", "bits": [3]},
                "b": {"direction": "input", "bits": [4]},
                "y": {"direction": "output", "bits": [6]}
            },
            "cells": {
                "r0": {"type": "$dff", "connections": {"C": [2], "D": [3], "Q": [5]}},
                "g0": {"type": "$xor", "connections": {"A": [5], "B": [4], "Y": [6]}}
            },
            "netnames": {"q": {"bits": [5]}, "y": {"bits": [6]}}
        }
    }
}"#;

fn slot(program: &RunProgram, info: &str) -> usize {
    program
        .debug_info()
        .iter()
        .position(|entry| entry == info)
        .unwrap_or_else(|| panic!("no slot named {info:?} in {:?}", program.debug_info()))
}

fn xor_program() -> RunProgram {
    let netlist = Netlist::from_json_str(XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    let mut tb = PortTestbench {
        cycles: 1,
        secrets: vec![PortGroup { ports: vec!["a".into()] }],
        data: vec![],
        masks: vec!["b".into()],
    };
    tb.drive(&mut sim).unwrap();
    sim.finish()
}

#[test]
fn xor_kernel_computes_xor() {
    let program = xor_program();
    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(42);

    program.randomize_secrets(&mut bufs, 1, &mut rng);
    program.randomize_masks(&mut bufs, 1, &mut rng);
    program.run_circuit(&mut bufs, 1);

    let s = slot(&program, "secret 0 unmasked");
    let m = slot(&program, "mask 0");
    let y = slot(&program, "y [0] @0");
    assert_eq!(bufs.storage[y], bufs.storage[s] ^ bufs.storage[m]);
    assert_ne!(bufs.storage[s], Word::ZEROS);
}

#[test]
fn count_run_accumulates_popcounts() {
    let program = xor_program();
    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(7);
    let mut count = vec![0u64; program.run_length() as usize];

    program.randomize_secrets(&mut bufs, 1, &mut rng);
    program.randomize_masks(&mut bufs, 1, &mut rng);
    program.run_circuit(&mut bufs, 1);
    program.count_run(&bufs, &mut count, 1);

    for (i, &c) in count.iter().enumerate() {
        assert_eq!(c, bufs.storage[i].popcount());
    }
}

#[test]
fn run_and_count_matches_separate_calls() {
    let program = xor_program();
    let mut rng = StdRng::seed_from_u64(9);

    let mut bufs_a = program.new_buffers();
    program.randomize_secrets(&mut bufs_a, 1, &mut rng);
    program.randomize_masks(&mut bufs_a, 1, &mut rng);
    let mut bufs_b = program.new_buffers();
    program.copy_secrets(&mut bufs_b.storage, &bufs_a.storage, 1);
    let m = slot(&program, "mask 0");
    bufs_b.storage[m] = bufs_a.storage[m];

    let mut count_a = vec![0u64; program.run_length() as usize];
    let mut count_b = vec![0u64; program.run_length() as usize];
    program.run_circuit(&mut bufs_a, 1);
    program.count_run(&bufs_a, &mut count_a, 1);
    program.run_and_count_circuit(&mut bufs_b, &mut count_b, 1);

    assert_eq!(count_a, count_b);
}

#[test]
fn fix_random_pins_whole_words() {
    let program = xor_program();
    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(3);

    program.fix_random_secrets(&mut bufs, 1, &mut rng);
    let s = slot(&program, "secret 0 unmasked");
    assert!(bufs.storage[s] == Word::ZEROS || bufs.storage[s] == Word::ONES);
}

#[test]
fn xor_runs_cancels_identical_runs() {
    let program = xor_program();
    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(5);

    program.randomize_secrets(&mut bufs, 1, &mut rng);
    program.randomize_masks(&mut bufs, 1, &mut rng);
    program.run_circuit(&mut bufs, 1);
    let snapshot = bufs.storage.clone();
    program.xor_runs(&mut bufs.storage, &snapshot, 1);
    for word in &bufs.storage {
        assert_eq!(*word, Word::ZEROS);
    }
}

#[test]
fn inverter_output_is_complement() {
    let netlist = Netlist::from_json_str(NOT_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    let mut tb = PortTestbench {
        cycles: 1,
        secrets: vec![PortGroup { ports: vec!["a".into()] }],
        data: vec![],
        masks: vec![],
    };
    tb.drive(&mut sim).unwrap();
    let program = sim.finish();

    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(17);
    program.randomize_secrets(&mut bufs, 1, &mut rng);
    program.run_circuit(&mut bufs, 1);

    let s = slot(&program, "secret 0 unmasked");
    let y = slot(&program, "y [0] @0");
    assert_eq!(bufs.storage[y], !bufs.storage[s]);
}

#[test]
fn register_delays_secret_by_one_cycle() {
    let netlist = Netlist::from_json_str(DFF_XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    let mut tb = PortTestbench {
        cycles: 2,
        secrets: vec![PortGroup { ports: vec!["a".into()] }],
        data: vec![],
        masks: vec!["b".into()],
    };
    tb.drive(&mut sim).unwrap();
    let program = sim.finish();
    assert_eq!(program.num_cycles(), 2);

    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(23);
    program.randomize_secrets(&mut bufs, 2, &mut rng);
    program.randomize_masks(&mut bufs, 2, &mut rng);
    program.run_circuit(&mut bufs, 2);

    let s = slot(&program, "secret 0 unmasked");
    let m1 = slot(&program, "mask 1");
    let y1 = slot(&program, "y [0] @1");
    assert_eq!(bufs.storage[y1], bufs.storage[s] ^ bufs.storage[m1]);
}

#[test]
fn running_fewer_cycles_skips_later_slots() {
    let netlist = Netlist::from_json_str(DFF_XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    let mut tb = PortTestbench {
        cycles: 2,
        secrets: vec![PortGroup { ports: vec!["a".into()] }],
        data: vec![],
        masks: vec!["b".into()],
    };
    tb.drive(&mut sim).unwrap();
    let program = sim.finish();

    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(29);
    program.randomize_secrets(&mut bufs, 2, &mut rng);
    program.randomize_masks(&mut bufs, 2, &mut rng);
    program.run_circuit(&mut bufs, 1);

    let y1 = slot(&program, "y [0] @1");
    assert_eq!(bufs.storage[y1], Word::ZEROS);
}

#[test]
fn shared_secret_reconstructs_from_shares() {
    const SHARED_JSON: &str = r#"{
        "modules": {
            "top": {
                "ports": {
                    "a0": {"direction": "input", "bits": [2]},
                    "a1": {"direction": "input", "bits": [3]},
                    "y": {"direction": "output", "bits": [4]}
                },
                "cells": {
                    "g0": {"type": "$and", "connections": {"A": [2], "B": [3], "Y": [4]}}
                },
                "netnames": {"y": {"bits": [4]}}
            }
        }
    }"#;
    let netlist = Netlist::from_json_str(SHARED_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    let mut tb = PortTestbench {
        cycles: 1,
        secrets: vec![PortGroup { ports: vec!["a0".into(), "a1".into()] }],
        data: vec![],
        masks: vec![],
    };
    tb.drive(&mut sim).unwrap();
    let program = sim.finish();
    // A two-share secret registers a mask range for the share slots.
    assert_eq!(program.mask_ranges().len(), 1);

    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(31);
    program.randomize_secrets(&mut bufs, 1, &mut rng);
    program.randomize_masks(&mut bufs, 1, &mut rng);
    program.run_circuit(&mut bufs, 1);

    let unmasked = slot(&program, "secret 0 unmasked");
    let share0 = slot(&program, "secret 0 share 0");
    let share1 = slot(&program, "secret 0 share 1");
    assert_eq!(
        bufs.storage[share0] ^ bufs.storage[share1],
        bufs.storage[unmasked]
    );
}

#[test]
fn emitted_text_has_all_sections() {
    let program = xor_program();
    let text = program.text();
    assert!(text.starts_with("// No license provided in JSON netlist\n"));
    assert!(text.contains("#include \"veil/circuit_utils.h\""));
    assert!(text.contains("void run_circuit_cycle_0(wtype_t* s)"));
    assert!(text.contains("// Saving y [0] @0"));
    assert!(text.contains("void run_circuit(wtype_t* s, uint32_t cycles)"));
    assert!(text.contains("void count_run(wtype_t* s, uintmax_t* count, uint32_t cycles)"));
    assert!(text.contains("void run_and_count_circuit"));
    assert!(text.contains("void xor_runs"));
    assert!(text.contains("void randomize_secrets"));
    assert!(text.contains("void randomize_data"));
    assert!(text.contains("void randomize_masks"));
    assert!(text.contains("void fix_random_secrets"));
    assert!(text.contains("void fix_random_data"));
    assert!(text.contains("void copy_secrets"));
    assert!(text.contains("void copy_data"));
    assert!(text.contains("uint32_t RUN_LENGTH = 3;"));
    assert!(text.contains("const char* DEBUG_INFO[3] = {"));
    assert!(text.contains("\t\"secret 0 unmasked\",\n"));
}

#[test]
fn debug_info_length_matches_run_length() {
    let program = xor_program();
    assert_eq!(program.debug_info().len(), program.run_length() as usize);
}

#[test]
fn identical_testbenches_hash_identically() {
    let a = xor_program();
    let b = xor_program();
    assert_eq!(a.build_hash(), b.build_hash());
    assert_eq!(a.text(), b.text());
}

#[test]
fn different_testbenches_hash_differently() {
    let a = xor_program();

    let netlist = Netlist::from_json_str(XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    let mut tb = PortTestbench {
        cycles: 1,
        secrets: vec![PortGroup { ports: vec!["b".into()] }],
        data: vec![PortGroup { ports: vec!["a".into()] }],
        masks: vec![],
    };
    tb.drive(&mut sim).unwrap();
    let b = sim.finish();

    assert_ne!(a.build_hash(), b.build_hash());
}

#[test]
fn manual_testbench_with_symbol_ops() {
    let netlist = Netlist::from_json_str(XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    sim.prepare_cycle();
    sim.allocate_secrets(BitRange::new(0, 0), 1).unwrap();
    sim.allocate_masks(BitRange::new(0, 0)).unwrap();
    let secret = sim.secrets_share(BitRange::new(0, 0), 0).unwrap();
    let mask = sim.masks(BitRange::new(0, 0)).unwrap();
    // Remask the secret before it reaches the port.
    let masked = sim.xor(secret[0], mask[0]);
    sim.assign("a", &[masked]).unwrap();
    sim.assign("b", &[mask[0]]).unwrap();
    sim.step_cycle().unwrap();
    let program = sim.finish();

    // Slots: the secret, the mask, and the xor output. The remasked
    // port value stays a transient temporary.
    assert_eq!(program.run_length(), 3);

    let mut bufs = program.new_buffers();
    let mut rng = StdRng::seed_from_u64(37);
    program.randomize_secrets(&mut bufs, 1, &mut rng);
    program.randomize_masks(&mut bufs, 1, &mut rng);
    program.run_circuit(&mut bufs, 1);

    let s = slot(&program, "secret 0 unmasked");
    let y = slot(&program, "y [0] @0");
    // y = (secret ^ mask) ^ mask cancels back to the secret.
    assert_eq!(bufs.storage[y], bufs.storage[s]);
}

#[test]
fn vcd_dump_writes_header_and_values() {
    let netlist = Netlist::from_json_str(XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    let mut tb = PortTestbench {
        cycles: 1,
        secrets: vec![PortGroup { ports: vec!["a".into()] }],
        data: vec![],
        masks: vec!["b".into()],
    };
    tb.drive(&mut sim).unwrap();

    let mut out = Vec::new();
    sim.dump_vcd(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("$scope module top $end"));
    assert!(text.contains("$enddefinitions $end"));
    assert!(text.contains("$dumpvars"));
    assert!(text.contains("bx") || text.contains("b0") || text.contains("b1"));
}

#[test]
fn vcd_dump_degrades_without_trace() {
    let netlist = Netlist::from_json_str(XOR_JSON, "top").unwrap();
    let sim = Simulator::new(&netlist);
    let mut out = Vec::new();
    sim.dump_vcd(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("$enddefinitions $end"));
    assert!(!text.contains("$dumpvars"));
}

#[test]
fn double_allocation_is_rejected() {
    let netlist = Netlist::from_json_str(XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    sim.prepare_cycle();
    sim.allocate_secrets(BitRange::new(0, 0), 1).unwrap();
    let err = sim.allocate_secrets(BitRange::new(0, 0), 1).unwrap_err();
    assert!(matches!(err, veil_sim::SimError::Redefined { kind: "secret", index: 0 }));
}

#[test]
fn step_without_prepare_is_rejected() {
    let netlist = Netlist::from_json_str(XOR_JSON, "top").unwrap();
    let mut sim = Simulator::new(&netlist);
    assert!(matches!(sim.step_cycle(), Err(veil_sim::SimError::UnpreparedCycle)));
}
