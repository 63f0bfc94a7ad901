use std::alloc::System;

use clap::Parser;
use stats_alloc::{INSTRUMENTED_SYSTEM, StatsAlloc};
use tracing_subscriber::EnvFilter;

use treesort::harness::{self, Config, HarnessError};

#[global_allocator]
static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

fn main() -> Result<(), HarnessError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("treesort=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let report = harness::run(&config, || GLOBAL.stats().bytes_allocated)?;

    if config.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{report}");
        println!("Done!");
    }

    report.check()
}
