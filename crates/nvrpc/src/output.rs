use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use nvrpc_codec::{value_to_json, ExtTypes, Value};
use nvrpc_transport::Endpoint;
use serde::Serialize;
use serde_json::Value as Json;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct CallOutput<'a> {
    pub method: &'a str,
    pub result: Json,
}

#[derive(Serialize)]
pub struct ApiInfoOutput<'a> {
    pub channel_id: i64,
    pub function_count: usize,
    pub protocol: &'a str,
}

#[derive(Serialize)]
struct EventOutput<'a> {
    kind: &'a str,
    method: &'a str,
    args: Json,
    timestamp: String,
}

/// Where rendered output goes. With a stdio endpoint stdout carries the
/// RPC stream, so output moves to stderr.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sink {
    Stdout,
    Stderr,
}

impl Sink {
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        match endpoint {
            Endpoint::Stdio => Self::Stderr,
            _ => Self::Stdout,
        }
    }

    pub fn line(self, text: &str) {
        match self {
            Self::Stdout => println!("{text}"),
            Self::Stderr => eprintln!("{text}"),
        }
    }
}

pub fn render_call(out: &CallOutput<'_>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(out),
        OutputFormat::Pretty => {
            serde_json::to_string_pretty(&out.result).unwrap_or_else(|_| "null".to_string())
        }
    }
}

pub fn render_api_info(out: &ApiInfoOutput<'_>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(out),
        OutputFormat::Pretty => format!(
            "channel={} functions={} protocol={}",
            out.channel_id, out.function_count, out.protocol
        ),
    }
}

pub fn render_event(
    kind: &str,
    method: &str,
    args: &[Value],
    ext: &ExtTypes,
    format: OutputFormat,
) -> String {
    let args = Json::Array(args.iter().map(|arg| value_to_json(arg, ext)).collect());
    match format {
        OutputFormat::Json => to_json(&EventOutput {
            kind,
            method,
            args,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Pretty => format!("{kind} {method} {args}"),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
