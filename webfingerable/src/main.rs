use colored::Colorize;
use tracing_subscriber::EnvFilter;
use webfingerable::{command_argument_builder, handle_init, handle_probe, handle_run};

#[tokio::main]
async fn main() {
    // Logs go to stderr so `probe` output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    let outcome = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command).map(|_| ()),
        Some(("run", primary_command)) => handle_run(primary_command, quiet).await.map(|_| ()),
        Some(("probe", primary_command)) => handle_probe(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
