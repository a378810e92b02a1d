use nvrpc_session::ProtocolMode;

use crate::cmd::{connect, parse_duration, ApiInfoArgs};
use crate::exit::{rpc_error, CliResult, SUCCESS};
use crate::output::{render_api_info, ApiInfoOutput, OutputFormat, Sink};

pub async fn run(args: ApiInfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let (client, _events) = connect(&args.endpoint, Some(timeout)).await?;

    let info = client
        .fetch_api_info()
        .await
        .map_err(|err| rpc_error("api info failed", err))?;

    let out = ApiInfoOutput {
        channel_id: info.channel_id,
        function_count: info.functions.len(),
        protocol: match client.mode() {
            ProtocolMode::Native => "msgpack",
            ProtocolMode::LineJson => "line-json",
        },
    };
    Sink::for_endpoint(&args.endpoint).line(&render_api_info(&out, format));
    client.detach();
    Ok(SUCCESS)
}
