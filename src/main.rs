use anyhow::{Context, Result};
use pipeline_matrix::cli::commands::{ListCommand, ProvisionerArg, RunCommand, ValidateCommand};
use pipeline_matrix::cli::output::*;
use pipeline_matrix::cli::{Cli, Command};
use pipeline_matrix::core::{self, MatrixResult, PipelineMatrix};
use pipeline_matrix::environment::Provisioner;
use pipeline_matrix::error::ConfigError;
use pipeline_matrix::execution::{MatrixRunner, RunnerConfig, RunnerEvent};
use pipeline_matrix::report;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

const EXIT_FAILED: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; stdout is reserved for the report
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let code = match &cli.command {
        Command::Run(cmd) => run_matrix(cmd).await?,
        Command::Validate(cmd) => validate_matrix(cmd)?,
        Command::List(cmd) => list_pipelines(cmd)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run_matrix(cmd: &RunCommand) -> Result<i32> {
    let matrix = match core::load_file(&cmd.file).and_then(|m| m.select(&cmd.pipeline, &cmd.group)) {
        Ok(matrix) => matrix,
        Err(e) => {
            print_config_error(&e);
            return Ok(EXIT_CONFIG);
        }
    };

    eprintln!(
        "{} Running {} pipeline(s) from {}",
        INFO,
        style(matrix.len()).cyan(),
        style(&cmd.file).bold()
    );

    let mut config = RunnerConfig::new().with_concurrency(cmd.concurrency);
    if let Some(secs) = cmd.timeout {
        config = config.with_default_timeout(Duration::from_secs(secs));
    }

    let (result, interrupted) = match cmd.provisioner {
        ProvisionerArg::Local => {
            execute(MatrixRunner::new(cmd.local_provisioner(), config), &matrix, cmd.max_time).await
        }
        ProvisionerArg::Docker => {
            execute(MatrixRunner::new(cmd.docker_provisioner(), config), &matrix, cmd.max_time).await
        }
    };

    if let Some(path) = &cmd.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write result to {}", path))?;
        eprintln!("{} Result written to {}", INFO, style(path).dim());
    }

    let (verdict, text) = report::summarize(&result);
    println!("{}", separator());
    print!("{}", text);

    if interrupted {
        return Ok(EXIT_INTERRUPTED);
    }
    Ok(if verdict.is_success() { 0 } else { EXIT_FAILED })
}

/// Run the matrix with live event output, cancelling on Ctrl-C or after `max_time` seconds
///
/// Returns the result and whether the run was interrupted by the user.
async fn execute<P: Provisioner + 'static>(
    mut runner: MatrixRunner<P>,
    matrix: &PipelineMatrix,
    max_time: Option<u64>,
) -> (MatrixResult, bool) {
    let progress = create_progress_bar(matrix.len());
    {
        let progress = progress.clone();
        runner.add_event_handler(move |event| {
            if let RunnerEvent::PipelineFinished { .. } = &event {
                progress.inc(1);
            }
            progress.suspend(|| eprintln!("{}", format_runner_event(&event)));
        });
    }

    let cancel = runner.cancellation_token();
    let interrupted = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = cancel.clone();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            let deadline = async {
                match max_time {
                    Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {}
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        interrupted.store(true, Ordering::SeqCst);
                        warn!("Interrupted, cancelling run");
                        cancel.cancel();
                    }
                }
                _ = deadline => {
                    warn!("Run exceeded {}s, cancelling", max_time.unwrap_or_default());
                    cancel.cancel();
                }
            }
        })
    };

    let result = runner.execute(matrix).await;
    watcher.abort();
    progress.finish_and_clear();

    (result, interrupted.load(Ordering::SeqCst))
}

fn validate_matrix(cmd: &ValidateCommand) -> Result<i32> {
    match core::load_file(&cmd.file) {
        Ok(matrix) => {
            if cmd.json {
                let names: Vec<&str> = matrix.pipelines().map(|p| p.name.as_str()).collect();
                let data = serde_json::json!({
                    "valid": true,
                    "groups": matrix.groups().len(),
                    "pipelines": names,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Matrix definition is valid!", CHECK);
                println!("  Groups: {}", style(matrix.groups().len()).cyan());
                println!("  Pipelines: {}", style(matrix.len()).cyan());
            }
            Ok(0)
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": e.to_string() });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_config_error(&e);
            }
            Ok(EXIT_CONFIG)
        }
    }
}

fn list_pipelines(cmd: &ListCommand) -> Result<i32> {
    let matrix = match core::load_file(&cmd.file) {
        Ok(matrix) => matrix,
        Err(e) => {
            print_config_error(&e);
            return Ok(EXIT_CONFIG);
        }
    };

    if cmd.json {
        let pipelines: Vec<_> = matrix
            .pipelines()
            .map(|p| {
                serde_json::json!({
                    "group": p.group,
                    "name": p.name,
                    "images": p.steps.iter().map(|s| s.image.as_str()).collect::<Vec<_>>(),
                    "commands": p.command_count(),
                })
            })
            .collect();
        let data = serde_json::json!({ "pipelines": pipelines });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{}", format_matrix(&matrix));
    }
    Ok(0)
}

fn print_config_error(error: &ConfigError) {
    println!("{} Invalid matrix definition:", CROSS);
    println!("  {}", style(error).red());
}
