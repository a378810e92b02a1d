use nvrpc_codec::{json_to_value, value_to_json, Value};
use serde_json::Value as Json;

use crate::cmd::{connect, parse_duration, CallArgs};
use crate::exit::{rpc_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{render_call, CallOutput, OutputFormat, Sink};

pub async fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let call_args = parse_args(&args.args)?;
    let timeout = parse_duration(&args.timeout)?;
    let (client, _events) = connect(&args.endpoint, Some(timeout)).await?;

    let result = client
        .request(&args.method, call_args)
        .await
        .map_err(|err| rpc_error("call failed", err))?;

    let out = CallOutput {
        method: &args.method,
        result: value_to_json(&result, &client.config().ext_types),
    };
    Sink::for_endpoint(&args.endpoint).line(&render_call(&out, format));
    client.detach();
    Ok(SUCCESS)
}

/// `--args` must be a JSON array; each element becomes one argument.
fn parse_args(raw: &str) -> CliResult<Vec<Value>> {
    match serde_json::from_str::<Json>(raw) {
        Ok(Json::Array(items)) => Ok(items.iter().map(json_to_value).collect()),
        Ok(other) => Err(CliError::new(
            USAGE,
            format!("--args must be a JSON array, got {other}"),
        )),
        Err(err) => Err(CliError::new(
            USAGE,
            format!("--args is not valid JSON: {err}"),
        )),
    }
}
