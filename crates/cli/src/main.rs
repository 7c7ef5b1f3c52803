use std::process::ExitCode;

fn main() -> ExitCode {
    safepost_cli::run()
}
