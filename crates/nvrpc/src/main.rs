mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "nvrpc", version, about = "Talk msgpack-RPC to a Neovim or Vim host")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use nvrpc_transport::Endpoint;

    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "nvrpc",
            "call",
            "/tmp/nvim.sock",
            "nvim_eval",
            "--args",
            "[\"1 + 1\"]",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.endpoint, Endpoint::Unix("/tmp/nvim.sock".into()));
                assert_eq!(args.method, "nvim_eval");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_tcp_and_stdio_endpoints() {
        let cli = Cli::try_parse_from(["nvrpc", "api-info", "127.0.0.1:6666"])
            .expect("api-info args should parse");
        assert!(matches!(
            cli.command,
            Command::ApiInfo(args) if args.endpoint == Endpoint::Tcp("127.0.0.1:6666".to_string())
        ));

        let cli = Cli::try_parse_from(["nvrpc", "listen", "-", "--count", "2"])
            .expect("listen args should parse");
        assert!(matches!(
            cli.command,
            Command::Listen(args) if args.endpoint == Endpoint::Stdio && args.count == Some(2)
        ));
    }

    #[test]
    fn call_requires_method() {
        let err = Cli::try_parse_from(["nvrpc", "call", "/tmp/nvim.sock"])
            .expect_err("missing method should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn log_flags_are_global() {
        let cli = Cli::try_parse_from([
            "nvrpc",
            "listen",
            "/tmp/nvim.sock",
            "--log-format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("global flags should parse after the subcommand");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_level, LogLevel::Debug);
    }
}
