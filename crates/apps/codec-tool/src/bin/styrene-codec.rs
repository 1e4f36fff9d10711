use clap::Parser;
use codec_tool::cli::app::{run_cli, Cli};

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();
    if let Err(err) = run_cli(cli) {
        eprintln!("styrene-codec: {err:#}");
        std::process::exit(1);
    }
}
