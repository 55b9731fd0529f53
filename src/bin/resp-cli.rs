//! resp-cli: interactive client for resp-loop
//!
//! Each input line is split on whitespace and sent as one request. Typing
//! `begin` buffers subsequent lines until `exec`, which sends them in a
//! single write and prints the replies in order.

use clap::Parser;
use resp_loop::client::{Client, ClientError, Pipeline};
use std::io::{self, BufRead, Write};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "resp-cli")]
#[command(version)]
#[command(about = "Interactive client for the resp-loop server", long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

const HELP: &str = "\
Client Commands:
  help              - Show this message.
  quit              - Exit the client.
  begin             - Start a pipeline. Commands will be buffered.
  exec              - Execute the buffered pipeline.
Any other text is sent as a command (e.g., 'ping', 'echo hello').
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut client = Client::connect(args.addr.as_str())?;
    println!("Connected to the server. Type 'help' for commands.");

    if let Err(e) = repl(&mut client, io::stdin().lock(), &mut io::stdout().lock()) {
        error!(error = %e, "Session ended");
    }

    println!("Connection closed.");
    Ok(())
}

/// Read lines from `input` until EOF or `quit`, writing prompts and replies
/// to `out`. Returns an error once the connection is no longer usable.
fn repl<R: BufRead, W: Write>(
    client: &mut Client,
    input: R,
    out: &mut W,
) -> Result<(), ClientError> {
    let mut pipeline: Option<Pipeline> = None;
    let mut lines = input.lines();

    loop {
        write!(out, "{}", if pipeline.is_some() { "pipe> " } else { "> " })?;
        out.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.is_empty() {
            continue;
        }

        match line.as_str() {
            "quit" => break,
            "help" => {
                write!(out, "{HELP}")?;
                continue;
            }
            "begin" => {
                pipeline = Some(Pipeline::new());
                writeln!(out, "Pipeline mode started. Type 'exec' to send.")?;
                continue;
            }
            _ => {}
        }

        match pipeline.take() {
            Some(batch) if line == "exec" => {
                if batch.is_empty() {
                    writeln!(out, "Pipeline is empty.")?;
                } else {
                    let replies = client.execute(batch)?;
                    writeln!(out, "--- Pipeline Responses ---")?;
                    for reply in replies {
                        writeln!(out, "{reply}")?;
                    }
                    writeln!(out, "------------------------")?;
                }
            }
            Some(mut batch) => {
                if batch.queue(&line) {
                    writeln!(out, "QUEUED")?;
                } else {
                    writeln!(out, "Invalid command.")?;
                }
                pipeline = Some(batch);
            }
            None => match client.call(&line) {
                Ok(reply) => writeln!(out, "{reply}")?,
                Err(ClientError::EmptyCommand) => writeln!(out, "Invalid command.")?,
                Err(e) => return Err(e),
            },
        }
    }

    Ok(())
}
