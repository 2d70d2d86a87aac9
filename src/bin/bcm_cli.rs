use std::process::ExitCode;

use colored::Colorize;

fn main() -> ExitCode {
    bcm_ledger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut stdout = std::io::stdout().lock();
    match bcm_ledger::cli::run_from_env(&args, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
