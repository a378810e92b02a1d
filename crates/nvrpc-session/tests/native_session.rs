use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nvrpc_codec::{ExtTypes, Message, MsgpackCodec, RemoteHandle, Value};
use nvrpc_session::{
    Client, ClientConfig, EventCallback, HostEvent, HostEvents, NativeTransport, ResumeOptions,
    RpcError, Transport, TransportEvent,
};
use nvrpc_transport::{split, StreamPair};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

const WAIT: Duration = Duration::from_secs(5);

struct FakeHost {
    rx: FramedRead<ReadHalf<DuplexStream>, MsgpackCodec>,
    tx: FramedWrite<WriteHalf<DuplexStream>, MsgpackCodec>,
}

impl FakeHost {
    async fn recv(&mut self) -> Message {
        tokio::time::timeout(WAIT, self.rx.next())
            .await
            .expect("host timed out")
            .expect("client closed the stream")
            .expect("codec error")
            .expect("undecodable message")
    }

    async fn send(&mut self, msg: Message) {
        self.tx.send(msg).await.unwrap();
    }

    async fn expect_request(&mut self, method: &str) -> (i64, Vec<Value>) {
        match self.recv().await {
            Message::Request {
                id,
                method: got,
                args,
            } if got == method => (id, args),
            other => panic!("expected request {method}, got {other:?}"),
        }
    }

    async fn expect_notification(&mut self, method: &str) -> Vec<Value> {
        match self.recv().await {
            Message::Notification { method: got, args } if got == method => args,
            other => panic!("expected notification {method}, got {other:?}"),
        }
    }
}

fn setup(config: ClientConfig) -> (Client, HostEvents, FakeHost) {
    let (client_io, host_io) = tokio::io::duplex(64 * 1024);
    let (client, events) = Client::attach(split(client_io), config);
    let (read, write) = tokio::io::split(host_io);
    let host = FakeHost {
        rx: FramedRead::new(read, MsgpackCodec::new()),
        tx: FramedWrite::new(write, MsgpackCodec::new()),
    };
    (client, events, host)
}

async fn next_event(events: &mut HostEvents) -> HostEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("no host event")
        .expect("event channel closed")
}

fn call(method: &str, args: Vec<Value>) -> Value {
    Value::Array(vec![Value::from(method), Value::Array(args)])
}

#[tokio::test]
async fn request_receives_result() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let task = tokio::spawn({
        let client = client.clone();
        async move { client.request("get_x", vec![]).await }
    });

    let (id, args) = host.expect_request("get_x").await;
    assert!(args.is_empty());
    host.send(Message::response(id, Ok(Value::from(42)))).await;

    assert_eq!(task.await.unwrap().unwrap(), Value::from(42));
}

#[tokio::test]
async fn host_error_reaches_only_that_request() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let failing = client.start_request("nvim_eval", vec![Value::from("x")]).unwrap();
    let passing = client.start_request("nvim_eval", vec![Value::from("1")]).unwrap();

    let (first, _) = host.expect_request("nvim_eval").await;
    let (second, _) = host.expect_request("nvim_eval").await;
    host.send(Message::response(
        first,
        Err(Value::Array(vec![Value::from(1), Value::from("E121: Undefined variable: x")])),
    ))
    .await;
    host.send(Message::response(second, Ok(Value::from(1)))).await;

    match failing.recv().await {
        Err(RpcError::Request { kind, message }) => {
            assert_eq!(kind, 1);
            assert!(message.contains("E121"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(passing.recv().await.unwrap(), Value::from(1));
}

#[tokio::test]
async fn out_of_order_responses_match_by_id() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let a = client.start_request("get_a", vec![]).unwrap();
    let b = client.start_request("get_b", vec![]).unwrap();

    let (id_a, _) = host.expect_request("get_a").await;
    let (id_b, _) = host.expect_request("get_b").await;
    assert!(id_b > id_a);

    host.send(Message::response(id_b, Ok(Value::from("b")))).await;
    host.send(Message::response(id_a, Ok(Value::from("a")))).await;

    assert_eq!(a.recv().await.unwrap(), Value::from("a"));
    assert_eq!(b.recv().await.unwrap(), Value::from("b"));
}

#[tokio::test]
async fn resume_replays_queue_as_one_atomic_call() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let level = client.pause();
    assert_eq!(level, 1);
    client.notify("m1", vec![]);
    client.notify("m2", vec![]);

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.resume(level, ResumeOptions::default()).await }
    });

    let (id, args) = host.expect_request("nvim_call_atomic").await;
    assert_eq!(
        args,
        vec![Value::Array(vec![call("m1", vec![]), call("m2", vec![])])]
    );
    host.send(Message::response(
        id,
        Ok(Value::Array(vec![
            Value::Array(vec![Value::Nil, Value::Nil]),
            Value::Nil,
        ])),
    ))
    .await;

    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.failure.is_none());
    assert_eq!(client.pause_level(), 0);
}

#[tokio::test]
async fn nested_levels_replay_separately() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let outer = client.pause();
    client.notify("a", vec![]);
    let inner = client.pause();
    client.notify("b", vec![Value::from(1)]);

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.resume(inner, ResumeOptions::default()).await }
    });
    let (id, args) = host.expect_request("nvim_call_atomic").await;
    assert_eq!(args, vec![Value::Array(vec![call("b", vec![Value::from(1)])])]);
    host.send(Message::response(
        id,
        Ok(Value::Array(vec![Value::Array(vec![Value::Nil]), Value::Nil])),
    ))
    .await;
    task.await.unwrap().unwrap();

    client.notify("c", vec![]);
    let task = tokio::spawn({
        let client = client.clone();
        async move { client.resume(outer, ResumeOptions::default()).await }
    });
    let (id, args) = host.expect_request("nvim_call_atomic").await;
    assert_eq!(
        args,
        vec![Value::Array(vec![call("a", vec![]), call("c", vec![])])]
    );
    host.send(Message::response(
        id,
        Ok(Value::Array(vec![Value::Array(vec![Value::Nil, Value::Nil]), Value::Nil])),
    ))
    .await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn resume_must_name_top_level() {
    let (client, _events, _host) = setup(ClientConfig::default());
    assert!(matches!(
        client.resume(1, ResumeOptions::default()).await,
        Err(RpcError::NotPaused)
    ));
    let outer = client.pause();
    let _inner = client.pause();
    assert!(matches!(
        client.cancel(outer),
        Err(RpcError::PauseMismatch { .. })
    ));
    assert_eq!(client.pause_level(), 2);
}

#[tokio::test]
async fn pause_levels_are_not_reused_after_resume() {
    let (client, _events, _host) = setup(ClientConfig::default());
    let first = client.pause();
    let outcome = client.resume(first, ResumeOptions::default()).await.unwrap();
    assert_eq!(outcome, Default::default());

    let second = client.pause();
    assert_eq!((first, second), (1, 2));
    assert!(matches!(
        client.cancel(first),
        Err(RpcError::PauseMismatch {
            requested: 1,
            current: 2
        })
    ));
    assert_eq!(client.pause_level(), 2);
    assert_eq!(client.cancel(second).unwrap(), 0);
    assert_eq!(client.pause_level(), 0);
}

#[tokio::test]
async fn replay_as_notify_and_cancel() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let level = client.pause();
    client.notify("m1", vec![]);
    let outcome = client
        .resume(
            level,
            ResumeOptions {
                replay_as_notify: true,
                redraw: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, Default::default());
    let args = host.expect_notification("nvim_call_atomic").await;
    assert_eq!(args, vec![Value::Array(vec![call("m1", vec![])])]);

    let level = client.pause();
    client.notify("discarded", vec![]);
    assert_eq!(client.cancel(level).unwrap(), 1);
    client.notify("after", vec![]);
    host.expect_notification("after").await;
}

#[tokio::test]
async fn atomic_failure_is_attributed_to_queued_call() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let level = client.pause();
    client.notify("nvim_command", vec![Value::from("echo 1")]);
    client.notify("nvim_command", vec![Value::from("bogus")]);

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.resume(level, ResumeOptions::default()).await }
    });
    let (id, _) = host.expect_request("nvim_call_atomic").await;
    host.send(Message::response(
        id,
        Ok(Value::Array(vec![
            Value::Array(vec![Value::Nil]),
            Value::Array(vec![
                Value::from(1),
                Value::from(0),
                Value::from("E492: Not an editor command: bogus"),
            ]),
        ])),
    ))
    .await;

    let outcome = task.await.unwrap().unwrap();
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.index, 1);
    assert_eq!(failure.method, "nvim_command");
    assert_eq!(failure.args, vec![Value::from("bogus")]);
    assert!(failure.message.starts_with("E492"));
}

#[tokio::test]
async fn requests_are_never_queued() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let level = client.pause();
    client.notify("queued", vec![]);
    let reply = client.start_request("immediate", vec![]).unwrap();

    let (id, _) = host.expect_request("immediate").await;
    host.send(Message::response(id, Ok(Value::Nil))).await;
    reply.recv().await.unwrap();
    client.cancel(level).unwrap();
}

#[tokio::test]
async fn detach_flushes_pending_requests() {
    let (client, mut events, mut host) = setup(ClientConfig::default());
    let replies: Vec<_> = (0..3)
        .map(|_| client.start_request("slow", vec![]).unwrap())
        .collect();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(host.expect_request("slow").await.0);
    }

    client.detach();
    for reply in replies {
        assert!(matches!(reply.recv().await, Err(RpcError::Disconnected)));
    }
    assert!(matches!(next_event(&mut events).await, HostEvent::Disconnected));
    assert!(!client.is_connected());
    assert!(matches!(
        client.request("late", vec![]).await,
        Err(RpcError::Disconnected)
    ));
}

#[tokio::test]
async fn host_eof_detaches() {
    let (client, mut events, host) = setup(ClientConfig::default());
    let reply = client.start_request("pending", vec![]).unwrap();
    drop(host);

    assert!(matches!(reply.recv().await, Err(RpcError::Disconnected)));
    assert!(matches!(next_event(&mut events).await, HostEvent::Disconnected));
}

#[tokio::test]
async fn host_request_is_answered_once() {
    let (_client, mut events, mut host) = setup(ClientConfig::default());
    host.send(Message::request(5, "ping", vec![Value::from(1)])).await;

    match next_event(&mut events).await {
        HostEvent::Request {
            method,
            args,
            responder,
        } => {
            assert_eq!(method, "ping");
            assert_eq!(args, vec![Value::from(1)]);
            assert_eq!(responder.id(), 5);
            responder.ok(Value::from("pong"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        host.recv().await,
        Message::response(5, Ok(Value::from("pong")))
    );
}

#[tokio::test]
async fn dropped_responder_sends_error() {
    let (_client, mut events, mut host) = setup(ClientConfig::default());
    host.send(Message::request(9, "ignored", vec![])).await;
    drop(next_event(&mut events).await);

    match host.recv().await {
        Message::Response { id: 9, result: Err(_) } => {}
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn buffer_events_dispatch_until_detach() {
    let (client, mut events, mut host) = setup(ClientConfig::default());
    let ext = ExtTypes::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let on_lines = EventCallback::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let buffer = client.create_buffer(3);
    assert!(buffer.on("lines", on_lines.clone()));
    assert!(!buffer.on("lines", on_lines.clone()));
    assert!(buffer.on("detach", EventCallback::new(|_| {})));
    assert!(client.is_attached(3));

    let buf = ext.pack(RemoteHandle::buffer(3));
    let other = ext.pack(RemoteHandle::buffer(4));
    host.send(Message::notification("nvim_buf_lines_event", vec![buf.clone()])).await;
    host.send(Message::notification("nvim_buf_lines_event", vec![other])).await;
    host.send(Message::notification("nvim_buf_detach_event", vec![buf.clone()])).await;
    host.send(Message::notification("nvim_buf_lines_event", vec![buf])).await;
    host.send(Message::notification("sync", vec![])).await;

    match next_event(&mut events).await {
        HostEvent::Notification { method, .. } => assert_eq!(method, "sync"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(!client.is_attached(3));
}

#[tokio::test]
async fn async_bridge_request_roundtrip() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let task = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .send_async_request("doHover", vec![Value::from(1)])
                .await
        }
    });

    let args = host.expect_notification("nvim_call_function").await;
    assert_eq!(args[0], Value::from("coc#rpc#async_request"));
    let Value::Array(payload) = &args[1] else {
        panic!("unexpected payload {:?}", args[1]);
    };
    let id = payload[0].as_i64().unwrap();
    assert_eq!(payload[1], Value::from("doHover"));

    // A response for an id nobody waits on is ignored.
    host.send(Message::notification(
        "nvim_async_response_event",
        vec![Value::from(id + 100), Value::Nil, Value::from("stray")],
    ))
    .await;
    host.send(Message::notification(
        "nvim_async_response_event",
        vec![Value::from(id), Value::Nil, Value::from("done")],
    ))
    .await;

    assert_eq!(task.await.unwrap().unwrap(), Value::from("done"));
}

#[tokio::test]
async fn async_bridge_error_response() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let task = tokio::spawn({
        let client = client.clone();
        async move { client.send_async_request("fails", vec![]).await }
    });
    let args = host.expect_notification("nvim_call_function").await;
    let id = match &args[1] {
        Value::Array(payload) => payload[0].clone(),
        other => panic!("unexpected {other:?}"),
    };
    host.send(Message::notification(
        "nvim_async_response_event",
        vec![id, Value::from("no handler"), Value::Nil],
    ))
    .await;

    assert!(matches!(task.await.unwrap(), Err(RpcError::Remote(msg)) if msg == "no handler"));
}

#[tokio::test]
async fn host_async_request_is_answered_by_notification() {
    let (_client, mut events, mut host) = setup(ClientConfig::default());
    host.send(Message::notification(
        "nvim_async_request_event",
        vec![
            Value::from(7),
            Value::from("hover"),
            Value::Array(vec![Value::from(1)]),
        ],
    ))
    .await;

    match next_event(&mut events).await {
        HostEvent::Request {
            method,
            args,
            responder,
        } => {
            assert_eq!(method, "hover");
            assert_eq!(args, vec![Value::from(1)]);
            responder.ok(Value::from("info"));
        }
        other => panic!("unexpected {other:?}"),
    }

    let args = host.expect_notification("nvim_call_function").await;
    assert_eq!(
        args,
        vec![
            Value::from("coc#rpc#async_response"),
            Value::Array(vec![Value::from(7), Value::from("info"), Value::from(false)]),
        ]
    );
}

#[tokio::test]
async fn async_bridge_reply_is_queued_while_paused() {
    let (client, mut events, mut host) = setup(ClientConfig::default());
    let level = client.pause();
    host.send(Message::notification(
        "nvim_async_request_event",
        vec![
            Value::from(7),
            Value::from("hover"),
            Value::Array(vec![Value::from(1)]),
        ],
    ))
    .await;

    match next_event(&mut events).await {
        HostEvent::Request { responder, .. } => responder.ok(Value::from("info")),
        other => panic!("unexpected {other:?}"),
    }
    client.notify("after_reply", vec![]);
    client
        .resume(
            level,
            ResumeOptions {
                replay_as_notify: true,
                redraw: false,
            },
        )
        .await
        .unwrap();

    let args = host.expect_notification("nvim_call_atomic").await;
    assert_eq!(
        args,
        vec![Value::Array(vec![
            call(
                "nvim_call_function",
                vec![
                    Value::from("coc#rpc#async_response"),
                    Value::Array(vec![Value::from(7), Value::from("info"), Value::from(false)]),
                ],
            ),
            call("after_reply", vec![]),
        ])]
    );
}

#[tokio::test]
async fn host_error_event_is_not_forwarded() {
    let (_client, mut events, mut host) = setup(ClientConfig::default());
    host.send(Message::notification(
        "nvim_error_event",
        vec![Value::from(0), Value::from("boom")],
    ))
    .await;
    host.send(Message::notification("after", vec![])).await;

    match next_event(&mut events).await {
        HostEvent::Notification { method, .. } => assert_eq!(method, "after"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_sent_before_a_response_are_handled_first() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let seen = Arc::new(AtomicBool::new(false));
    let flag = seen.clone();
    let buffer = client.create_buffer(3);
    assert!(buffer.on(
        "lines",
        EventCallback::new(move |_| {
            std::thread::sleep(Duration::from_millis(2));
            flag.store(true, Ordering::SeqCst);
        }),
    ));

    let reply = client.start_request("nvim_buf_get_lines", vec![]).unwrap();
    let (id, _) = host.expect_request("nvim_buf_get_lines").await;
    let buf = ExtTypes::default().pack(RemoteHandle::buffer(3));
    host.send(Message::notification("nvim_buf_lines_event", vec![buf])).await;
    host.send(Message::response(id, Ok(Value::Nil))).await;

    assert_eq!(reply.recv().await.unwrap(), Value::Nil);
    assert!(seen.load(Ordering::SeqCst));
}

#[tokio::test]
async fn invalid_request_gets_error_response() {
    let (_client, mut events, mut host) = setup(ClientConfig::default());
    // [0, 5, "m", "x"]: request 5 with a string where the argument array goes.
    host.tx
        .get_mut()
        .write_all(&[0x94, 0x00, 0x05, 0xa1, b'm', 0xa1, b'x'])
        .await
        .unwrap();

    match host.recv().await {
        Message::Response { id, result } => {
            assert_eq!(id, 5);
            assert!(result.is_err());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        next_event(&mut events).await,
        HostEvent::Diagnostic(RpcError::Framing(_))
    ));
}

#[tokio::test]
async fn write_failure_stops_the_reader() {
    let (client_in, host_out) = tokio::io::duplex(64 * 1024);
    let (client_out, host_in) = tokio::io::duplex(64 * 1024);
    drop(host_in);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = NativeTransport::attach(
        StreamPair::new(client_in, client_out),
        &ClientConfig::default(),
        tx,
    );
    let mut host = FramedWrite::new(host_out, MsgpackCodec::new());

    transport.notify("lost", vec![]);
    match tokio::time::timeout(WAIT, rx.recv()).await {
        Ok(Some(TransportEvent::Detached)) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert!(!transport.is_attached());

    // The reader may already be gone, so the write itself can fail.
    let _ = host.send(Message::notification("late", vec![])).await;
    assert!(matches!(
        tokio::time::timeout(WAIT, rx.recv()).await,
        Ok(None)
    ));
}

#[tokio::test]
async fn malformed_frame_is_reported_and_stream_continues() {
    let (_client, mut events, mut host) = setup(ClientConfig::default());
    // [7, "?"]: a complete msgpack array with an unknown message type.
    host.tx
        .get_mut()
        .write_all(&[0x92, 0x07, 0xa1, b'?'])
        .await
        .unwrap();
    host.send(Message::notification("after", vec![])).await;

    assert!(matches!(
        next_event(&mut events).await,
        HostEvent::Diagnostic(RpcError::Framing(_))
    ));
    match next_event(&mut events).await {
        HostEvent::Notification { method, .. } => assert_eq!(method, "after"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn stale_pause_is_reported_once() {
    let config = ClientConfig {
        stale_pause_after: Duration::from_millis(20),
        ..ClientConfig::default()
    };
    let (client, mut events, _host) = setup(config);
    let level = client.pause();

    match next_event(&mut events).await {
        HostEvent::Diagnostic(RpcError::StalePause { level: stale, age }) => {
            assert_eq!(stale, level);
            assert!(age >= Duration::from_millis(20));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(client.pause_level(), 1);
    assert_eq!(client.cancel(level).unwrap(), 0);
}

#[tokio::test]
async fn request_timeout_then_late_response_is_ignored() {
    let config = ClientConfig {
        request_timeout: Some(Duration::from_millis(30)),
        ..ClientConfig::default()
    };
    let (client, _events, mut host) = setup(config);
    let reply = client.start_request("never", vec![]).unwrap();
    let (id, _) = host.expect_request("never").await;

    assert!(matches!(reply.recv().await, Err(RpcError::Timeout { .. })));
    host.send(Message::response(id, Ok(Value::Nil))).await;

    let next = client.start_request("works", vec![]).unwrap();
    let (id, _) = host.expect_request("works").await;
    host.send(Message::response(id, Ok(Value::from(true)))).await;
    assert_eq!(next.recv().await.unwrap(), Value::from(true));
}

#[tokio::test]
async fn api_info_is_recorded() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    assert!(client.has_function("anything"));
    assert!(!client.is_api_ready());

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.fetch_api_info().await }
    });
    let (id, _) = host.expect_request("nvim_get_api_info").await;
    let metadata = Value::Map(vec![(
        Value::from("functions"),
        Value::Array(vec![Value::Map(vec![(
            Value::from("name"),
            Value::from("nvim_command"),
        )])]),
    )]);
    host.send(Message::response(
        id,
        Ok(Value::Array(vec![Value::from(2), metadata])),
    ))
    .await;

    let info = task.await.unwrap().unwrap();
    assert_eq!(info.channel_id, 2);
    assert_eq!(client.channel_id(), Some(2));
    assert!(client.is_api_ready());
    assert!(client.has_function("nvim_command"));
    assert!(!client.has_function("nvim_missing"));
}

#[tokio::test]
async fn handles_decode_against_client() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    let ext = ExtTypes::default();

    let window = client.decode_handle(&ext.pack(RemoteHandle::window(1000))).unwrap();
    assert_eq!(window.id(), 1000);
    assert!(matches!(
        client.decode_handle(&Value::Ext(42, vec![0x01])),
        Err(RpcError::Protocol(_))
    ));

    let task = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .create_window(1000)
                .set_var("flag", Value::from(true))
                .await
        }
    });
    let (id, args) = host.expect_request("nvim_win_set_var").await;
    assert_eq!(
        args,
        vec![
            ext.pack(RemoteHandle::window(1000)),
            Value::from("flag"),
            Value::from(true)
        ]
    );
    host.send(Message::response(id, Ok(Value::Nil))).await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn last_notification_is_tracked() {
    let (client, _events, mut host) = setup(ClientConfig::default());
    assert!(client.last_notification().is_none());
    client.notify("nvim_command", vec![Value::from("echo 1")]);
    host.expect_notification("nvim_command").await;
    assert_eq!(
        client.last_notification(),
        Some(("nvim_command".to_string(), vec![Value::from("echo 1")]))
    );
}
