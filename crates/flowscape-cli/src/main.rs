use flowscape_cli::{command, init_tracing, run, Invocation};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = match command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let invocation = match Invocation::from_matches(&matches) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(invocation.log_json);

    match run(&invocation).await {
        Ok(report) => {
            for run in &report.runs {
                println!("{}: {}", run.run_folder.display(), run.summary());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "sweep failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
