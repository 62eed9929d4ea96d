//! Monte-Carlo mutual-information leakage verification.
//!
//! Loads a Yosys netlist, unrolls it under a port-driven testbench,
//! and estimates MI(S;F|D) for every observable wire.
//!
//! Exit codes: 0 success, 1 option error, 2 netlist/trace I/O error,
//! 3 parse or semantic error, 4 checkpoint inconsistency, 5 output
//! write error.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;
use log::info;

use veil_mi::{analyze, MiConfig, MiError, RawOpts, SaveData};
use veil_netlist::{Netlist, NetlistError};
use veil_sim::{PortGroup, PortTestbench, Simulator, Testbench};

/// Monte-Carlo estimation of secret leakage in a gate-level netlist.
#[derive(Parser, Debug)]
#[command(name = "verify_mi", version, about = "Quantify side-channel leakage via MI(S;F|D)")]
struct Args {
    /// Path to the Yosys netlist JSON.
    #[arg(long)]
    netlist: PathBuf,

    /// Top module to analyze.
    #[arg(long)]
    top: String,

    /// Secret share ports: one value per flag, comma-separated share
    /// ports within it (share 0 first).
    #[arg(long = "secret", value_name = "PORTS")]
    secrets: Vec<String>,

    /// Public data share ports, same form as --secret.
    #[arg(long = "data", value_name = "PORTS")]
    data: Vec<String>,

    /// Ports fed with freshly allocated masks on every cycle.
    #[arg(long = "mask", value_name = "PORT")]
    masks: Vec<String>,

    /// Clock cycles the testbench unrolls (defaults to --cycles, then 1).
    #[arg(long)]
    tb_cycles: Option<u32>,

    /// Write the emitted program text to this file.
    #[arg(long)]
    emit_file: Option<PathBuf>,

    /// Write a VCD dump of the symbolic trace to this file.
    #[arg(long)]
    vcd_file: Option<PathBuf>,

    /// Number of cycles to verify.
    #[arg(short, long)]
    cycles: Option<u32>,

    /// Epsilon distance of approximation from reality.
    #[arg(long)]
    epsilon: Option<f64>,

    /// Delta confidence of approximation in interval.
    #[arg(long)]
    delta: Option<f64>,

    /// Stop execution when far above the detectable threshold (default).
    #[arg(long)]
    early_stop: bool,

    /// Do not stop execution early.
    #[arg(long)]
    no_early_stop: bool,

    /// Number of samples for entropy H(F|D=d).
    #[arg(long)]
    num_samples_f_given_d: Option<u64>,

    /// Number of samples for entropy H(F|D=d,S=s).
    #[arg(long)]
    num_samples_f_given_ds: Option<u64>,

    /// Number of secret values s when averaging H(F|D=d,S=s).
    #[arg(short = 's', long)]
    num_secrets: Option<u64>,

    /// Number of data values d when averaging MI(S;F|D=d).
    #[arg(short = 'd', long)]
    num_data: Option<u64>,

    /// Total number of samples taken.
    #[arg(short = 'n', long)]
    num_samples: Option<u64>,

    /// Number of threads to run sampling.
    #[arg(short = 't', long)]
    num_threads: Option<u32>,

    /// Terminate the program after this many seconds.
    #[arg(short = 'x', long)]
    timeout: Option<u32>,

    /// Number of best leaks to continuously print.
    #[arg(long)]
    print_best: Option<u32>,

    /// Number of seconds in-between printing leaks.
    #[arg(long)]
    print_interval: Option<u32>,

    /// File from which to load results.
    #[arg(short = 'i', long)]
    load_file: Option<PathBuf>,

    /// File to which to store results.
    #[arg(short = 'o', long)]
    store_file: Option<PathBuf>,

    /// File to which to print final report.
    #[arg(short = 'r', long)]
    report_file: Option<PathBuf>,
}

fn port_groups(specs: &[String]) -> Vec<PortGroup> {
    specs
        .iter()
        .map(|spec| PortGroup {
            ports: spec.split(',').map(|p| p.trim().to_string()).collect(),
        })
        .collect()
}

fn netlist_exit_code(err: &NetlistError) -> i32 {
    match err {
        NetlistError::Io(_) => 2,
        _ => 3,
    }
}

fn run() -> i32 {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            return code;
        }
    };

    let netlist = match Netlist::from_file(&args.netlist, &args.top) {
        Ok(netlist) => netlist,
        Err(err) => {
            eprintln!("error while loading netlist: {err}");
            return netlist_exit_code(&err);
        }
    };

    let mut sim = Simulator::new(&netlist);
    let mut testbench = PortTestbench {
        cycles: args.tb_cycles.or(args.cycles).unwrap_or(1),
        secrets: port_groups(&args.secrets),
        data: port_groups(&args.data),
        masks: args.masks.clone(),
    };
    if let Err(err) = testbench.drive(&mut sim) {
        eprintln!("error while simulating testbench: {err}");
        return 3;
    }
    info!("unrolled {} cycles, {} variables", sim.cycles(), sim.num_vars());

    if let Some(path) = &args.vcd_file {
        let result = File::create(path)
            .map_err(veil_sim::SimError::from)
            .and_then(|file| sim.dump_vcd(BufWriter::new(file)));
        if let Err(err) = result {
            eprintln!("error while writing trace: {err}");
            return 2;
        }
    }

    let program = sim.finish();
    println!("RUN_LENGTH:    {}", program.run_length());
    println!("PARALLEL_SIZE: {}", veil_common::LANES);

    if let Some(path) = &args.emit_file {
        if let Err(err) = std::fs::write(path, program.text()) {
            eprintln!("error while writing emitted program: {err}");
            return 5;
        }
    }

    let raw = RawOpts {
        cycles: args.cycles,
        epsilon: args.epsilon,
        delta: args.delta,
        early_stop: args.early_stop,
        no_early_stop: args.no_early_stop,
        num_samples_f_given_d: args.num_samples_f_given_d,
        num_samples_f_given_ds: args.num_samples_f_given_ds,
        num_secrets: args.num_secrets,
        num_data: args.num_data,
        num_samples: args.num_samples,
        num_threads: args.num_threads,
        timeout: args.timeout,
        print_best: args.print_best,
        print_interval: args.print_interval,
        load_file: args.load_file,
        store_file: args.store_file,
        report_file: args.report_file,
    };
    let cfg = match MiConfig::resolve(raw, program.num_cycles()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error while parsing options: {err}");
            return 1;
        }
    };

    println!("cycles:                 {}", cfg.cycles);
    println!("delta:                  {}", cfg.delta);
    println!("num-samples-f-given-d:  {}", cfg.num_samples_f_given_d);
    println!("num-samples-f-given-ds: {}", cfg.num_samples_f_given_ds);
    println!("num-secrets:            {}", cfg.num_secrets);
    println!("num-data:               {}", cfg.num_data);
    println!("num-samples:            {}", cfg.num_samples);
    println!("num-threads:            {}", cfg.num_threads);

    let loaded = match &cfg.load_file {
        Some(path) => {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("error while opening checkpoint: {err}");
                    return 2;
                }
            };
            let data = match SaveData::read(file, Some(program.build_hash())) {
                Ok(data) => data,
                Err(err) => {
                    eprintln!("error while reading checkpoint: {err}");
                    return 4;
                }
            };
            if let Err(err) = data.validate(
                cfg.cycles,
                cfg.num_samples_f_given_d,
                cfg.num_samples_f_given_ds,
                cfg.num_secrets,
                u64::from(program.run_length()),
            ) {
                eprintln!("error while validating checkpoint: {err}");
                return 4;
            }
            Some(data)
        }
        None => None,
    };

    match analyze(&program, &cfg, loaded) {
        Ok(result) => {
            info!(
                "completed {} runs in {} ms{}",
                result.num_runs,
                result.duration_ms,
                if result.stopped { " (stopped)" } else { "" }
            );
            0
        }
        Err(MiError::Options(msg)) => {
            eprintln!("error: {msg}");
            1
        }
        Err(MiError::SaveData(err)) => {
            eprintln!("error while storing checkpoint: {err}");
            4
        }
        Err(MiError::Io(err)) => {
            eprintln!("error while writing results: {err}");
            5
        }
    }
}

fn main() {
    process::exit(run());
}
