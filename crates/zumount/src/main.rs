//! zumount CLI entry point.

use clap::Parser;
use color_eyre::eyre::Result;

use zumount::cli::Cli;

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Usage errors exit 1, help and version exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = i32::from(err.use_stderr());
            let _ = err.print();
            std::process::exit(code);
        }
    };

    cli.init_tracing()?;
    cli.execute()
}
