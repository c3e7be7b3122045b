use std::process::ExitCode;

fn main() -> ExitCode {
    billroute_cli::run()
}
