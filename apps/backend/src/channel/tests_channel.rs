use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::transport::memory_pair;
use super::*;

fn quiet_config() -> ChannelConfig {
    ChannelConfig {
        ping: false,
        ..ChannelConfig::default()
    }
}

fn channel(config: ChannelConfig) -> (Channel, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Channel::new(config, tx), rx)
}

fn open_channel(config: ChannelConfig) -> (Channel, mpsc::UnboundedReceiver<Frame>) {
    let (channel, rx) = channel(config);
    channel.open();
    (channel, rx)
}

/// Spawn the driver and hand back the peer side of the inbound stream.
fn drive(channel: &Channel) -> mpsc::UnboundedSender<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(channel.clone().run(UnboundedReceiverStream::new(rx)));
    tx
}

fn sent(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

fn envelopes(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Envelope> {
    sent(rx)
        .into_iter()
        .filter_map(|frame| match frame {
            Frame::Text(text) => Some(Envelope::parse(&text)),
            Frame::Close => None,
        })
        .collect()
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let read = {
        let count = count.clone();
        move || count.load(Ordering::SeqCst)
    };
    (count, read)
}

#[test]
fn named_handlers_run_in_order_before_wildcards() {
    let (channel, _rx) = open_channel(quiet_config());
    let seen = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let seen = seen.clone();
        channel.on("greet", move |data, _| {
            seen.lock().push(format!("{tag}:{}", data["n"]));
        });
    }
    {
        let seen = seen.clone();
        channel.wildcard(move |name, _, _| seen.lock().push(format!("*:{name}")));
    }

    channel.receive(r#"{"channel":"greet","data":{"n":1}}"#);
    channel.receive(r#"{"channel":"other","data":{}}"#);

    assert_eq!(
        *seen.lock(),
        vec!["first:1", "second:1", "*:greet", "*:other"]
    );
}

#[test]
fn handler_reply_is_correlated_with_request_id() {
    let (channel, mut rx) = open_channel(quiet_config());
    channel.on("echo", |data, responder| {
        assert!(responder.expects_reply());
        responder.send(data);
    });

    channel.receive(r#"{"channel":"echo","cbid":3,"data":{"hello":"there"}}"#);

    assert_eq!(
        envelopes(&mut rx),
        vec![Envelope::new(REPLY_CHANNEL, Some(3), json!({ "hello": "there" }))]
    );
}

#[test]
fn reply_without_request_id_is_a_no_op() {
    let (channel, mut rx) = open_channel(quiet_config());
    channel.on("echo", |data, responder| {
        assert!(!responder.expects_reply());
        responder.send(data);
    });

    channel.receive(r#"{"channel":"echo","data":1}"#);

    assert!(sent(&mut rx).is_empty());
}

#[test]
fn garbage_frames_degrade_to_raw() {
    let (channel, _rx) = open_channel(quiet_config());
    let got = Arc::new(Mutex::new(None));
    {
        let got = got.clone();
        channel.on(RAW_CHANNEL, move |data, _| *got.lock() = Some(data));
    }

    channel.receive("definitely not json");

    assert_eq!(
        *got.lock(),
        Some(json!({ "message": "definitely not json" }))
    );
}

#[test]
fn peer_cannot_raise_local_events() {
    let (channel, _rx) = open_channel(quiet_config());
    let (disconnects, read) = counter();
    channel.on(DISCONNECT_EVENT, move |_, _| {
        disconnects.fetch_add(1, Ordering::SeqCst);
    });
    let (wild, read_wild) = counter();
    channel.wildcard(move |_, _, _| {
        wild.fetch_add(1, Ordering::SeqCst);
    });

    channel.receive(r#"{"channel":"disconnect","data":{}}"#);
    channel.receive(r#"{"channel":"latency","data":5}"#);

    assert_eq!(read(), 0);
    assert_eq!(read_wild(), 0);
    assert!(channel.is_open());
}

#[test]
fn probes_are_answered() {
    let (channel, mut rx) = open_channel(quiet_config());

    channel.receive(r#"{"channel":"internal","cbid":7,"data":{"evtype":"ping"}}"#);
    channel.receive(r#"{"channel":"internal","cbid":8,"data":{"evtype":"pong"}}"#);

    assert_eq!(
        envelopes(&mut rx),
        vec![
            Envelope::new(REPLY_CHANNEL, Some(7), json!({ "status": true })),
            Envelope::new(
                REPLY_CHANNEL,
                Some(8),
                json!({ "status": false, "error": "evtype not recognized" })
            ),
        ]
    );
}

#[test]
fn destroy_fires_disconnect_once_and_closes_transport() {
    let (channel, mut rx) = open_channel(quiet_config());
    let (disconnects, read) = counter();
    channel.on(DISCONNECT_EVENT, move |_, _| {
        disconnects.fetch_add(1, Ordering::SeqCst);
    });
    let (wild, read_wild) = counter();
    channel.wildcard(move |_, _, _| {
        wild.fetch_add(1, Ordering::SeqCst);
    });

    channel.destroy();
    channel.destroy();

    assert_eq!(read(), 1);
    assert_eq!(read_wild(), 0);
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(sent(&mut rx), vec![Frame::Close]);

    // Nothing is dispatched after teardown.
    channel.receive(r#"{"channel":"internal","cbid":1,"data":{"evtype":"ping"}}"#);
    assert!(sent(&mut rx).is_empty());
}

#[test]
fn notify_keeps_order_and_is_dropped_once_closed() {
    let (channel, mut rx) = open_channel(quiet_config());

    channel.notify("a", json!(1));
    channel.notify("b", json!(2));
    channel.destroy();
    channel.notify("c", json!(3));

    let names: Vec<String> = envelopes(&mut rx).into_iter().map(|e| e.channel).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn reply_resolves_continuation_exactly_once() {
    let (channel, mut rx) = open_channel(quiet_config());
    let (calls, read) = counter();

    let cbid = channel
        .emit_with("ask", json!({ "q": 1 }), move |reply| {
            assert_eq!(reply, json!({ "a": 2 }));
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(
        envelopes(&mut rx),
        vec![Envelope::new("ask", Some(cbid), json!({ "q": 1 }))]
    );
    assert_eq!(channel.pending_replies(), 1);

    let reply = Envelope::new(REPLY_CHANNEL, Some(cbid), json!({ "a": 2 }))
        .encode()
        .unwrap();
    channel.receive(&reply);
    channel.receive(&reply);
    channel.receive(r#"{"channel":"callback","cbid":4242,"data":{}}"#);

    assert_eq!(read(), 1);
    assert_eq!(channel.pending_replies(), 0);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_is_evicted_after_reply_timeout() {
    let (channel, _rx) = open_channel(quiet_config());
    let _peer = drive(&channel);
    let started = Instant::now();

    let result = channel.request("ask", json!({})).await;

    assert!(matches!(result, Err(ChannelError::NoReply)));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(channel.pending_replies(), 0);
    assert!(channel.is_open());
}

#[tokio::test(start_paused = true)]
async fn emit_waits_for_open() {
    let (channel, mut rx) = channel(quiet_config());
    let sender = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.emit("hello", json!({ "x": 1 })).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(sent(&mut rx).is_empty());

    channel.open();
    sender.await.unwrap().unwrap();

    assert_eq!(
        envelopes(&mut rx),
        vec![Envelope::new("hello", None, json!({ "x": 1 }))]
    );
}

#[tokio::test(start_paused = true)]
async fn emit_gives_up_when_never_opened() {
    let (channel, _rx) = channel(quiet_config());

    let result = channel.emit("hello", json!({})).await;

    assert!(matches!(result, Err(ChannelError::OpenTimeout)));
}

#[tokio::test(start_paused = true)]
async fn emit_fails_when_destroyed_while_waiting() {
    let (channel, _rx) = channel(quiet_config());
    let sender = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.emit("hello", json!({})).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    channel.destroy();

    assert!(matches!(sender.await.unwrap(), Err(ChannelError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn unanswered_probe_closes_the_connection() {
    let (channel, mut rx) = open_channel(ChannelConfig::default());
    let (disconnects, read) = counter();
    channel.on(DISCONNECT_EVENT, move |_, _| {
        disconnects.fetch_add(1, Ordering::SeqCst);
    });
    let _peer = drive(&channel);

    tokio::time::sleep(Duration::from_secs(11)).await;
    let probes = envelopes(&mut rx);
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].channel, PROBE_CHANNEL);
    assert_eq!(probes[0].data, json!({ "evtype": "ping" }));
    assert!(channel.is_open());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(read(), 1);
}

#[tokio::test(start_paused = true)]
async fn answered_probes_keep_the_pair_alive_and_record_latency() {
    let (left, right) = memory_pair(ChannelConfig::default(), ChannelConfig::default());
    let samples = Arc::new(Mutex::new(Vec::<Value>::new()));
    {
        let samples = samples.clone();
        left.on(LATENCY_EVENT, move |rtt, _| samples.lock().push(rtt));
    }

    tokio::time::sleep(Duration::from_secs(65)).await;

    assert!(left.is_open());
    assert!(right.is_open());
    assert!(left.latency().is_some());
    assert!(right.latency().is_some());
    assert!(samples.lock().len() >= 5);
}

#[tokio::test(start_paused = true)]
async fn request_round_trips_through_a_memory_pair() {
    let (client, server) = memory_pair(quiet_config(), quiet_config());
    server.on("sum", |data, responder| {
        let total: i64 = data
            .as_array()
            .map(|xs| xs.iter().filter_map(Value::as_i64).sum())
            .unwrap_or_default();
        responder.send(json!({ "total": total }));
    });

    let reply = client.request("sum", json!([1, 2, 3])).await.unwrap();

    assert_eq!(reply, json!({ "total": 6 }));
}

#[tokio::test(start_paused = true)]
async fn destroying_one_side_of_a_pair_ends_the_other() {
    let (client, server) = memory_pair(quiet_config(), quiet_config());
    let (disconnects, read) = counter();
    server.on(DISCONNECT_EVENT, move |_, _| {
        disconnects.fetch_add(1, Ordering::SeqCst);
    });

    client.destroy();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(server.state(), ChannelState::Closed);
    assert_eq!(read(), 1);
}

#[tokio::test(start_paused = true)]
async fn deny_notifies_then_closes_after_delay() {
    let (channel, mut rx) = open_channel(ChannelConfig::default());
    let _peer = drive(&channel);

    channel.deny("server full");
    assert_eq!(
        envelopes(&mut rx),
        vec![Envelope::new(
            GLOBAL_CHANNEL,
            None,
            json!({ "evtype": "denied", "reason": "server full" })
        )]
    );

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(channel.is_open());
    // Probing stopped with the deny, so nothing else went out.
    assert!(envelopes(&mut rx).is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn retry_announces_delay_then_closes() {
    let (channel, mut rx) = open_channel(quiet_config());
    let _peer = drive(&channel);

    channel.retry(Some(Duration::from_secs(3)));
    assert_eq!(
        envelopes(&mut rx),
        vec![Envelope::new(
            GLOBAL_CHANNEL,
            None,
            json!({ "evtype": "retry", "delay": 3.0 })
        )]
    );

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert!(channel.is_open());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn retry_without_delay_backs_off_between_five_and_fifteen_seconds() {
    let (channel, mut rx) = open_channel(quiet_config());
    let _peer = drive(&channel);

    channel.retry(None);
    let notice = envelopes(&mut rx).remove(0);
    let delay = notice.data["delay"].as_f64().unwrap();
    assert!((5.0..15.0).contains(&delay), "delay {delay}");

    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert!(channel.is_open());
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(channel.state(), ChannelState::Closed);
}
