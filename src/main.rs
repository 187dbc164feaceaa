use assembly_snptyper::cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity count
    let filter = match cli.verbose {
        0 => EnvFilter::new("assembly_snptyper=warn"),
        1 => EnvFilter::new("assembly_snptyper=info,warn"),
        _ => EnvFilter::new("assembly_snptyper=debug,info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    cli::run(cli)
}
