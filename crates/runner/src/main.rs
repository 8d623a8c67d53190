//! `pyrunner` -- run one script or inline code fragment and print the result.
//!
//! Prints the `ScriptResult` JSON document on stdout. Logs go to stderr.
//! Exits 0 on success, 1 when the run failed, 2 on usage or configuration
//! errors.
//!
//! ```text
//! pyrunner [--timeout-ms <ms>] script <identifier> [args...]
//! pyrunner [--timeout-ms <ms>] code <code> [args...]
//! ```
//!
//! # Environment variables
//!
//! | Variable                | Required | Default              | Description                  |
//! |-------------------------|----------|----------------------|------------------------------|
//! | `PYTHON_BIN`            | no       | `/usr/bin/python3`   | Interpreter executable       |
//! | `PYRUNNER_WORKING_DIR`  | no       | current directory    | Child cwd, base for roots    |
//! | `PYRUNNER_SCRIPTS_DIR`  | no       | `python-scripts`     | Default script root          |
//! | `PYRUNNER_OVERRIDE_DIR` | no       | `src/app/api/python` | Override script root         |
//! | `PYRUNNER_TIMEOUT_MS`   | no       | `30000`              | Default timeout budget       |

use std::process::ExitCode;
use std::time::Duration;

use pyrunner_core::config::parse_timeout_ms;
use pyrunner_core::scripting::result::ScriptResult;
use pyrunner_core::scripting::runner::PythonRunner;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: pyrunner [--timeout-ms <ms>] script <identifier> [args...]
       pyrunner [--timeout-ms <ms>] code <code> [args...]";

/// What to run, parsed from the command line.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Script { identifier: String, args: Vec<String> },
    Code { code: String, args: Vec<String> },
}

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    timeout: Option<Duration>,
    invocation: Invocation,
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut argv = argv.into_iter();
    let mut timeout = None;

    let mode = loop {
        match argv.next().as_deref() {
            Some("--timeout-ms") => {
                let raw = argv
                    .next()
                    .ok_or_else(|| "--timeout-ms needs a value".to_string())?;
                timeout = Some(parse_timeout_ms(&raw).map_err(|e| e.to_string())?);
            }
            Some(mode) => break mode.to_string(),
            None => return Err("missing subcommand".into()),
        }
    };

    let target = argv
        .next()
        .ok_or_else(|| format!("'{mode}' needs a target"))?;
    let args: Vec<String> = argv.collect();

    let invocation = match mode.as_str() {
        "script" => Invocation::Script {
            identifier: target,
            args,
        },
        "code" => Invocation::Code { code: target, args },
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    Ok(CliArgs {
        timeout,
        invocation,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pyrunner=info,pyrunner_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("pyrunner: {msg}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let runner = match PythonRunner::from_env() {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load runner configuration");
            return ExitCode::from(2);
        }
    };

    tracing::debug!(
        interpreter = %runner.config().interpreter.display(),
        default_timeout_ms = runner.config().default_timeout.as_millis() as u64,
        "Runner configured",
    );

    let result: ScriptResult = match &cli.invocation {
        Invocation::Script { identifier, args } => {
            runner.run_script(identifier, args, cli.timeout).await
        }
        Invocation::Code { code, args } => runner.run_code(code, args, cli.timeout).await,
    };

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize result");
            return ExitCode::FAILURE;
        }
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
