use colored::Colorize;
use marker_bind::cli::CommandLineInterface;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let command_line_interface = CommandLineInterface::load();
    init_tracing(command_line_interface.verbose);
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `-v` switches the crate to debug.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("marker_bind=debug")
        } else {
            EnvFilter::new("marker_bind=info")
        }
    });
    fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}
