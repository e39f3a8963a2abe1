//! Command-line driver for a single Chain-DPA run.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cdpa::attack::cdpa_attack;
use cdpa::config::{DiagMode, EngineConfig};
use cdpa::harness::run as run_harness;
use cdpa::trace_gen::generate_traces;

#[derive(Debug, Parser)]
#[command(name = "cdpa_cli")]
#[command(about = "Chain-DPA side-channel secret recovery", long_about = None)]
struct Args {
    /// Number of bits in the secret numbers
    #[arg(short = 'b', long = "bit-count", default_value_t = 32)]
    bit_count: u32,

    /// Number of shares
    #[arg(short = 's', long = "share-count", default_value_t = 1)]
    share_count: u32,

    /// Number of traces to acquire for the attack
    #[arg(short = 't', long = "trace-count", default_value_t = 100_000)]
    trace_count: u64,

    /// Standard deviation of the normally distributed noise added to the trace
    #[arg(short = 'n', long = "noise", default_value_t = 0.0)]
    noise: f64,

    /// The number of experiments to perform
    #[arg(short = 'e', long = "experiment-count", default_value_t = 1)]
    experiment_count: u64,

    /// A random seed for the secret generation
    #[arg(short = 'r', long = "random-seed")]
    random_seed: Option<u64>,

    /// Provide detailed per-step printout
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Print the per-trace window listing (implies verbose)
    #[arg(short = 'l', long = "list-of-traces")]
    list_of_traces: bool,

    /// Worker threads for independent experiments (harness-level only)
    #[arg(long = "threads", default_value_t = 1)]
    threads: usize,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cdpa_cli=info,cdpa=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let verbose = args.verbose || args.list_of_traces;
    let diag = if args.list_of_traces {
        DiagMode::FullTrace
    } else if verbose {
        DiagMode::Steps
    } else {
        DiagMode::Off
    };

    let cfg = match EngineConfig::new(
        args.bit_count,
        args.share_count,
        args.trace_count,
        args.noise,
        args.experiment_count,
        args.random_seed,
        diag,
        args.threads,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if diag.is_enabled() {
        run_verbose(&cfg)?;
    } else {
        let report = run_harness(&cfg)?;
        println!("{:5.2}% correct answers", report.result_rate * 100.0);
        println!(
            "{:5.2}% correct least significant bits",
            report.lsb_rate * 100.0
        );
        println!("{:5.2}% correct bits", report.bit_rate * 100.0);
    }

    Ok(())
}

/// Single-experiment verbose/diagnostic run: hex display of the secrets, a
/// per-step moment table, and a final Success/Failure token. The exact
/// column layout is illustrative, not a compatibility contract.
fn run_verbose(cfg: &EngineConfig) -> Result<()> {
    let generated = generate_traces(cfg, cfg.seed)?;
    let result = cdpa_attack(
        &generated.data,
        &generated.traces,
        cfg.bit_count,
        cfg.share_count,
        cfg.diag,
    );

    let nibble_count = ((cfg.bit_count - 1) >> 2) as usize + 1;
    println!(
        "Secret values:    X = {:0w$x}, Y = {:0w$x}",
        generated.x,
        generated.y,
        w = nibble_count
    );
    println!(
        "Recovered values: X = {:0w$x}, Y = {:0w$x}",
        result.x_hat,
        result.y_hat,
        w = nibble_count
    );
    println!();

    if let Some(diags) = &result.diagnostics {
        println!(
            "{:<10}{}",
            "",
            (0..diags.steps.len())
                .map(|i| format!("Step {i:<3}"))
                .collect::<Vec<_>>()
                .join(" ")
        );
        for j in 0..4 {
            print!("L(M{j})    ");
            for step in &diags.steps {
                let m = step.moments[j];
                if m.is_nan() {
                    print!("{:>8}", "--");
                } else {
                    print!("{m:>8.2}");
                }
            }
            println!();
        }
        println!();
        for j in 0..2 {
            print!("d2L(M{j})  ");
            for step in &diags.steps {
                match step.leaps {
                    Some(leaps) => print!("{:>8.2}", leaps[j]),
                    None => print!("{:>8}", "--"),
                }
            }
            println!();
        }
        println!();
        print!("x low bits");
        for step in &diags.steps {
            print!("{:>8x}", step.x_low_bits);
        }
        println!();
        print!("y low bits");
        for step in &diags.steps {
            print!("{:>8x}", step.y_low_bits);
        }
        println!();

        if cfg.diag.lists_traces() && !diags.window_membership.is_empty() {
            println!();
            println!(
                "{:<10}{}",
                "trace",
                (1..=diags.window_membership.len())
                    .map(|i| format!("Step {i:<3}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            );
            for k in 0..generated.data.len() {
                print!("{k:<10}");
                for step_membership in &diags.window_membership {
                    print!("{:>8}", step_membership[k]);
                }
                println!();
            }
        }
    }

    let mask = if cfg.bit_count == 1 {
        0
    } else {
        (1u64 << (cfg.bit_count - 1)) - 1
    };
    let x_dif = generated.x ^ result.x_hat;
    let y_dif = generated.y ^ result.y_hat;
    let highest_bit_match = if cfg.bit_count == 1 {
        (x_dif ^ y_dif) == 0
    } else {
        ((x_dif ^ y_dif) >> (cfg.bit_count - 1)) == 0
    };
    let success = highest_bit_match
        && (x_dif & mask) == 0
        && (y_dif & mask) == 0;

    println!();
    println!("{}", if success { "Success" } else { "Failure" });
    Ok(())
}
