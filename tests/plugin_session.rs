use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use streamdeck_govee::{
    host,
    sdk::{LaunchArgs, POWER_ACTION_UUID},
    GoveeClient, PluginHost,
};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};
use tokio_tungstenite::{accept_async, tungstenite::Message};

async fn next_json<S>(socket: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for the plugin")
            .expect("plugin closed the socket")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn spawn_plugin(
    args: LaunchArgs,
    client: GoveeClient,
) -> tokio::task::JoinHandle<Result<(), host::HostError>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let plugin = PluginHost::new(Arc::new(client), tx);
    tokio::spawn(async move { host::run(&args, plugin, rx).await })
}

async fn wait_until_matched(mock: &mockito::Mock) {
    for _ in 0..100 {
        if mock.matched_async().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("mock was never matched");
}

#[tokio::test]
async fn key_press_toggles_the_light_through_the_host() {
    let mut govee = Server::new_async().await;
    let read = govee
        .mock("GET", "/v1/devices/state")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("device".into(), "D1".into()),
            Matcher::UrlEncoded("model".into(), "M1".into()),
        ]))
        .match_header("Govee-API-Key", "K")
        .with_status(200)
        .with_body(
            json!({"data": {"properties": [{"online": true}, {"powerState": "on"}]}}).to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let write = govee
        .mock("PUT", "/v1/devices/control")
        .match_header("Govee-API-Key", "K")
        .match_body(Matcher::Json(json!({
            "device": "D1",
            "model": "M1",
            "cmd": {"name": "turn", "value": "off"}
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let args = LaunchArgs::parse([
        "-port".to_string(),
        port.to_string(),
        "-pluginUUID".to_string(),
        "PLUGIN-1".to_string(),
        "-registerEvent".to_string(),
        "registerPlugin".to_string(),
        "-info".to_string(),
        "{}".to_string(),
    ])
    .unwrap();

    let client = GoveeClient::new(govee.url()).unwrap();
    let plugin = spawn_plugin(args, client);

    let (stream, _) = listener.accept().await.unwrap();
    let mut socket = accept_async(stream).await.unwrap();

    assert_eq!(
        next_json(&mut socket).await,
        json!({"event": "registerPlugin", "uuid": "PLUGIN-1"})
    );

    for event in [
        json!({
            "action": POWER_ACTION_UUID,
            "event": "willAppear",
            "context": "ctx-1",
            "device": "deck",
            "payload": {"settings": {"device": "D1", "model": "M1", "api_key": "K"}}
        }),
        json!({
            "action": POWER_ACTION_UUID,
            "event": "keyUp",
            "context": "ctx-1",
            "device": "deck",
            "payload": {"settings": {"device": "D1", "model": "M1", "api_key": "K"}}
        }),
    ] {
        socket.send(Message::Text(event.to_string())).await.unwrap();
    }

    wait_until_matched(&write).await;
    read.assert_async().await;
    write.assert_async().await;

    socket
        .send(Message::Text(
            json!({
                "action": POWER_ACTION_UUID,
                "event": "sendToPlugin",
                "context": "ctx-1",
                "payload": {"sdpi_collection": {"key": "model", "value": "M2"}}
            })
            .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(
        next_json(&mut socket).await,
        json!({
            "event": "setSettings",
            "context": "ctx-1",
            "payload": {"device": "D1", "model": "M2", "api_key": "K"}
        })
    );

    socket.close(None).await.unwrap();
    let result = timeout(Duration::from_secs(5), plugin).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn key_press_without_power_state_sends_nothing() {
    let mut govee = Server::new_async().await;
    let read = govee
        .mock("GET", "/v1/devices/state")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"data": {"properties": [{"online": false}]}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let write = govee
        .mock("PUT", "/v1/devices/control")
        .expect(0)
        .create_async()
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let args = LaunchArgs::parse([
        "-port",
        &port.to_string(),
        "-pluginUUID",
        "PLUGIN-1",
        "-registerEvent",
        "registerPlugin",
    ])
    .unwrap();

    let client = GoveeClient::new(govee.url()).unwrap();
    let plugin = spawn_plugin(args, client);

    let (stream, _) = listener.accept().await.unwrap();
    let mut socket = accept_async(stream).await.unwrap();
    next_json(&mut socket).await;

    for event in [
        json!({
            "action": POWER_ACTION_UUID,
            "event": "didReceiveSettings",
            "context": "ctx-1",
            "payload": {"settings": {"device": "D1", "model": "M1", "api_key": "K"}}
        }),
        json!({"action": POWER_ACTION_UUID, "event": "keyUp", "context": "ctx-1"}),
    ] {
        socket.send(Message::Text(event.to_string())).await.unwrap();
    }

    wait_until_matched(&read).await;
    // Give a stray write a chance to show up before asserting it never did.
    tokio::time::sleep(Duration::from_millis(100)).await;
    write.assert_async().await;

    socket.close(None).await.unwrap();
    let result = timeout(Duration::from_secs(5), plugin).await.unwrap().unwrap();
    assert!(result.is_ok());
}
