use std::time::Duration;

use clap::{Args, Subcommand};
use nvrpc_session::{Client, ClientConfig, HostEvents, TransportConfig};
use nvrpc_transport::Endpoint;
use tracing::debug;

use crate::exit::{rpc_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod api_info;
pub mod call;
pub mod listen;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue one request and print its result.
    Call(CallArgs),
    /// Print the channel id and function count reported by the host.
    ApiInfo(ApiInfoArgs),
    /// Print host notifications until the stream closes.
    Listen(ListenArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format).await,
        Command::ApiInfo(args) => api_info::run(args, format).await,
        Command::Listen(args) => listen::run(args, format).await,
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path, host:port, or `-` for stdio.
    pub endpoint: Endpoint,
    /// API method, e.g. nvim_eval.
    pub method: String,
    /// Arguments as a JSON array.
    #[arg(long, default_value = "[]")]
    pub args: String,
    /// Give up waiting for the reply after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ApiInfoArgs {
    /// Socket path, host:port, or `-` for stdio.
    pub endpoint: Endpoint,
    /// Give up waiting for the reply after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path, host:port, or `-` for stdio.
    pub endpoint: Endpoint,
    /// Exit after printing N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

/// Connect with configuration taken from the environment.
pub(crate) async fn connect(
    endpoint: &Endpoint,
    timeout: Option<Duration>,
) -> CliResult<(Client, HostEvents)> {
    let config = ClientConfig {
        request_timeout: timeout,
        ..ClientConfig::with_transport(TransportConfig::from_env())
    };
    debug!(%endpoint, mode = ?config.transport.protocol_mode, "connecting");
    Client::connect(endpoint, config)
        .await
        .map_err(|err| rpc_error("connect failed", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
