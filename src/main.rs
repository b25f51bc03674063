use std::io;

use clap::Parser;
use indicatif::ProgressDrawTarget;

use fsec::cli::{self, Args};

fn copy_notice() {
    println!(
        "\n fsec {}, find bad sectors on block devices\n \
         Reads only, never writes to the device. Comes with ABSOLUTELY NO WARRANTY.\n",
        env!("CARGO_PKG_VERSION")
    );
}

fn main() {
    let args = Args::parse();

    let default = if args.verbose { "fsec=debug" } else { "fsec=error" };
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();

    if !args.list {
        copy_notice();
    }

    let code = cli::run(&args, io::stdout(), ProgressDrawTarget::stdout());
    std::process::exit(code);
}
