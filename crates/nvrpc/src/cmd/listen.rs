use nvrpc_session::HostEvent;
use tracing::{info, warn};

use crate::cmd::{connect, ListenArgs};
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::{render_event, OutputFormat, Sink};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, mut events) = connect(&args.endpoint, None).await?;
    let sink = Sink::for_endpoint(&args.endpoint);
    let ext = client.config().ext_types;
    let limit = args.count;
    let mut printed = 0usize;

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                info!("interrupted");
                client.detach();
                return Ok(SUCCESS);
            }
        };

        match event {
            Some(HostEvent::Notification { method, args }) => {
                sink.line(&render_event("notification", &method, &args, &ext, format));
                printed = printed.saturating_add(1);
                if limit.is_some_and(|limit| printed >= limit) {
                    client.detach();
                    return Ok(SUCCESS);
                }
            }
            Some(HostEvent::Request {
                method,
                args,
                responder,
            }) => {
                sink.line(&render_event("request", &method, &args, &ext, format));
                responder.error(format!("{method} is not handled by nvrpc listen"));
            }
            Some(HostEvent::Diagnostic(err)) => warn!(error = %err, "session diagnostic"),
            Some(HostEvent::Disconnected) | None => return Ok(SUCCESS),
        }
    }
}
