use std::path::Path;
use std::time::Duration;

use axum::http::Uri;
use bytes::Bytes;
use gw2map_shared::ConnectionState;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{
    BROKER_KEEP_ALIVE_SECS, BROKER_REQUEST_QUEUE, REPLAY_INTERVAL_MS, broker_client_id,
    broker_credentials, broker_url, reconnect_base, reconnect_max, replay_file,
};
use crate::state::AppState;

/// Feed raw broker payloads to the reconciler, either from the MQTT broker
/// or from a replay capture.
pub async fn run(state: AppState, payloads: mpsc::Sender<Bytes>) {
    if let Some(path) = replay_file() {
        replay(&state, &path, &payloads).await;
        return;
    }

    let Some(url) = broker_url() else {
        warn!("LIVE_BROKER_URL is off; no live markers will be received");
        state.set_connection_state(ConnectionState::Disconnected);
        return;
    };

    let mut options = match broker_options(&url, &broker_client_id()) {
        Ok(options) => options,
        Err(e) => {
            warn!(error = %e, "live broker disabled");
            state.set_connection_state(ConnectionState::Disconnected);
            return;
        }
    };
    if let Some((username, password)) = broker_credentials() {
        options.set_credentials(username, password);
    }

    info!(%url, "connecting to live broker");
    relay(&state, options, &payloads).await;
}

/// MQTT options for `wss://`, `ws://`, `mqtt://` or `tcp://` broker URLs.
pub(crate) fn broker_options(url: &str, client_id: &str) -> Result<MqttOptions, String> {
    let uri: Uri = url
        .parse()
        .map_err(|e| format!("invalid broker url {url}: {e}"))?;
    let host = uri
        .host()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| format!("broker url {url} has no host"))?;

    let mut options = match uri.scheme_str() {
        Some("wss") => {
            let mut options = MqttOptions::new(client_id, url, uri.port_u16().unwrap_or(443));
            options.set_transport(Transport::wss_with_default_config());
            options
        }
        Some("ws") => {
            let mut options = MqttOptions::new(client_id, url, uri.port_u16().unwrap_or(80));
            options.set_transport(Transport::Ws);
            options
        }
        Some("mqtt") | Some("tcp") => {
            MqttOptions::new(client_id, host, uri.port_u16().unwrap_or(1883))
        }
        other => {
            return Err(format!(
                "unsupported broker scheme {:?} in {url}",
                other.unwrap_or("")
            ));
        }
    };
    options.set_keep_alive(Duration::from_secs(BROKER_KEEP_ALIVE_SECS));
    options.set_clean_session(true);
    Ok(options)
}

async fn relay(state: &AppState, options: MqttOptions, payloads: &mpsc::Sender<Bytes>) {
    let (client, mut eventloop) = AsyncClient::new(options, BROKER_REQUEST_QUEUE);
    let follower = tokio::spawn(follow_topic(client.clone(), state.topic.subscribe()));

    state.set_connection_state(ConnectionState::Connecting);
    poll_broker(state, &client, &mut eventloop, payloads).await;

    info!("payload receiver dropped; stopping live broker client");
    follower.abort();
    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "broker disconnect request not queued");
    }
}

/// Drive the MQTT event loop until the reconciler stops taking payloads.
/// The loop reconnects on its next poll after an error.
async fn poll_broker(
    state: &AppState,
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    payloads: &mpsc::Sender<Bytes>,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to live broker");
                state.set_connection_state(ConnectionState::Connected);
                consecutive_failures = 0;
                // Clean sessions start with no subscriptions.
                subscribe(client, state.current_topic());
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if payloads.send(publish.payload).await.is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "live broker connection lost");
                state.set_connection_state(ConnectionState::Disconnected);
                state.observability.record_transport_reconnect();
                consecutive_failures = consecutive_failures.saturating_add(1);
                let delay =
                    reconnect_delay(consecutive_failures, reconnect_base(), reconnect_max());
                debug!(
                    attempt = consecutive_failures,
                    delay_ms = delay.as_millis() as u64,
                    "waiting before reconnect"
                );
                sleep(delay).await;
                state.set_connection_state(ConnectionState::Connecting);
            }
        }
    }
}

/// Exponential backoff: `base * 2^(n-1)`, capped.
pub(crate) fn reconnect_delay(
    consecutive_failures: u32,
    base: Duration,
    max: Duration,
) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(6);
    let factor = 1u32 << exponent;
    base.saturating_mul(factor).min(max)
}

/// Swap the broker subscription whenever the topic watch changes. Requests
/// queue while disconnected and go out once the event loop reconnects.
async fn follow_topic(client: AsyncClient, mut topic_rx: watch::Receiver<Option<String>>) {
    let mut subscribed = topic_rx.borrow_and_update().clone();

    while topic_rx.changed().await.is_ok() {
        let topic = topic_rx.borrow_and_update().clone();
        if topic == subscribed {
            continue;
        }

        if let Some(old) = subscribed.take() {
            match client.try_unsubscribe(old.as_str()) {
                Ok(()) => info!(topic = %old, "unsubscribed from live topic"),
                Err(e) => warn!(error = %e, topic = %old, "failed to queue unsubscribe"),
            }
        }
        subscribe(&client, topic.clone());
        subscribed = topic;
    }
}

fn subscribe(client: &AsyncClient, topic: Option<String>) {
    let Some(topic) = topic else {
        info!("no shared topic for the current channel; waiting");
        return;
    };
    match client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
        Ok(()) => info!(%topic, "subscribed to live topic"),
        Err(e) => warn!(error = %e, %topic, "failed to queue subscribe"),
    }
}

async fn replay(state: &AppState, path: &Path, payloads: &mpsc::Sender<Bytes>) {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to read live replay file");
            state.set_connection_state(ConnectionState::Disconnected);
            return;
        }
    };

    let lines = replay_payloads(&contents);
    info!(path = %path.display(), payloads = lines.len(), "replaying live capture");
    state.set_connection_state(ConnectionState::Connected);

    let mut interval = tokio::time::interval(Duration::from_millis(REPLAY_INTERVAL_MS));
    for payload in lines {
        interval.tick().await;
        if payloads.send(payload).await.is_err() {
            return;
        }
    }

    info!("live replay finished");
    state.set_connection_state(ConnectionState::Disconnected);
}

/// One payload per non-blank line.
fn replay_payloads(contents: &str) -> Vec<Bytes> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Bytes::copy_from_slice(line.as_bytes()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::BytesMut;
    use gw2map_shared::{ChannelSettings, ConnectionState, MapContext};
    use rumqttc::mqttbytes::{self, v4};
    use rumqttc::{
        ConnAck, ConnectReturnCode, MqttOptions, Packet, Publish, QoS, SubAck,
        SubscribeReasonCode, Transport, UnsubAck,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    use super::{broker_options, reconnect_delay, relay, replay_payloads};
    use crate::state::AppState;

    const EU_TOPIC: &str = "maps.gw2.io/global/1/eu/#";
    const GUILD_TOPIC: &str = "maps.gw2.io/guild/g/#";

    #[test]
    fn reconnect_delay_doubles_until_capped() {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(10);
        assert_eq!(reconnect_delay(1, base, max), Duration::from_millis(500));
        assert_eq!(reconnect_delay(2, base, max), Duration::from_secs(1));
        assert_eq!(reconnect_delay(5, base, max), Duration::from_secs(8));
        assert_eq!(reconnect_delay(6, base, max), max);
        assert_eq!(reconnect_delay(u32::MAX, base, max), max);
    }

    #[test]
    fn replay_skips_blank_lines() {
        let payloads = replay_payloads("{\"Type\":\"A\"}\n\n   \n{\"Type\":\"B\"}\n");
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].as_ref(), br#"{"Type":"B"}"#);
    }

    #[test]
    fn broker_urls_pick_the_transport() {
        let options = broker_options("wss://post.gw2.io:8084/ws", "gw2map").expect("wss url");
        assert_eq!(
            options.broker_address(),
            ("wss://post.gw2.io:8084/ws".to_string(), 8084)
        );
        assert!(matches!(options.transport(), Transport::Wss(_)));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));

        let options = broker_options("mqtt://localhost", "gw2map").expect("mqtt url");
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert!(matches!(options.transport(), Transport::Tcp));

        assert!(broker_options("https://post.gw2.io/ws", "gw2map").is_err());
        assert!(broker_options("not a url", "gw2map").is_err());
    }

    async fn read_packet(socket: &mut TcpStream, buf: &mut BytesMut) -> Packet {
        loop {
            match v4::read(buf, 64 * 1024) {
                Ok(Packet::PingReq) => continue,
                Ok(packet) => return packet,
                Err(mqttbytes::Error::InsufficientBytes(_)) => {
                    let read = socket.read_buf(buf).await.expect("read from client");
                    assert!(read > 0, "client closed the connection");
                }
                Err(e) => panic!("malformed packet from client: {e:?}"),
            }
        }
    }

    async fn write_packet(
        socket: &mut TcpStream,
        write: impl FnOnce(&mut BytesMut) -> Result<usize, mqttbytes::Error>,
    ) {
        let mut out = BytesMut::new();
        write(&mut out).expect("encode packet");
        socket.write_all(&out).await.expect("write to client");
    }

    #[tokio::test]
    async fn broker_session_subscribes_forwards_and_resubscribes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind broker");
        let port = listener.local_addr().expect("broker address").port();

        let (state, _commands) = AppState::new(ChannelSettings::default(), MapContext::Tyria);
        state.topic.send_replace(Some(EU_TOPIC.to_string()));
        let (payload_tx, mut payload_rx) = mpsc::channel(8);

        let client_state = state.clone();
        let client = tokio::spawn(async move {
            let options = MqttOptions::new("gw2map-test", "127.0.0.1", port);
            relay(&client_state, options, &payload_tx).await;
        });

        let (mut socket, _) = listener.accept().await.expect("accept client");
        let mut buf = BytesMut::new();

        assert!(matches!(read_packet(&mut socket, &mut buf).await, Packet::Connect(..)));
        write_packet(&mut socket, |out| {
            ConnAck::new(ConnectReturnCode::Success, false).write(out)
        })
        .await;

        let Packet::Subscribe(subscribe) = read_packet(&mut socket, &mut buf).await else {
            panic!("expected SUBSCRIBE after CONNACK");
        };
        assert_eq!(subscribe.filters.len(), 1);
        assert_eq!(subscribe.filters[0].path, EU_TOPIC);
        assert_eq!(subscribe.filters[0].qos, QoS::AtMostOnce);
        write_packet(&mut socket, |out| {
            SubAck::new(
                subscribe.pkid,
                vec![SubscribeReasonCode::Success(QoS::AtMostOnce)],
            )
            .write(out)
        })
        .await;

        let body = r#"{"Type":"UpdateCharacterKeepAlive","AccountName":"a"}"#;
        write_packet(&mut socket, |out| {
            Publish::new("maps.gw2.io/global/1/eu/a", QoS::AtMostOnce, body).write(out)
        })
        .await;

        let payload = payload_rx.recv().await.expect("payload forwarded");
        assert_eq!(payload.as_ref(), body.as_bytes());
        assert_eq!(state.connection_state(), ConnectionState::Connected);

        state.topic.send_replace(Some(GUILD_TOPIC.to_string()));

        let Packet::Unsubscribe(unsubscribe) = read_packet(&mut socket, &mut buf).await else {
            panic!("expected UNSUBSCRIBE after the topic changed");
        };
        assert_eq!(unsubscribe.topics, vec![EU_TOPIC.to_string()]);
        write_packet(&mut socket, |out| UnsubAck::new(unsubscribe.pkid).write(out)).await;

        let Packet::Subscribe(resubscribe) = read_packet(&mut socket, &mut buf).await else {
            panic!("expected SUBSCRIBE for the new topic");
        };
        assert_eq!(resubscribe.filters[0].path, GUILD_TOPIC);
        assert_eq!(resubscribe.filters[0].qos, QoS::AtMostOnce);

        client.abort();
    }
}
