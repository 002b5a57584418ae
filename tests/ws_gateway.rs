//! End-to-end tests: the full axum app on an ephemeral port backed by the
//! in-memory store, driven over real sockets.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use listing_notify::api;
use listing_notify::app_state::AppState;
use listing_notify::domain::{Identity, ListingId, Role, UserId};
use listing_notify::hub::ConnectionSettings;
use listing_notify::persistence::{
    InMemoryStore, NotificationStore, RecipientDirectory, SessionResolver,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestApp {
    addr: SocketAddr,
    store: Arc<InMemoryStore>,
    http: reqwest::Client,
}

impl TestApp {
    async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.set_agent(ListingId::new(42), UserId::new(7)).await;
        store.add_favorite(UserId::new(3), ListingId::new(42)).await;
        store.add_favorite(UserId::new(8), ListingId::new(42)).await;
        for (token, user, role) in [
            ("agent-7", 7, Role::Agent),
            ("user-3", 3, Role::User),
            ("user-9", 9, Role::User),
        ] {
            store
                .add_session(token, Identity::new(UserId::new(user), role))
                .await;
        }

        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            Arc::clone(&store) as Arc<dyn RecipientDirectory>,
            Arc::clone(&store) as Arc<dyn SessionResolver>,
            ConnectionSettings::default(),
            Duration::from_secs(5),
        );

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind ephemeral port");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, api::build_app(state)).await;
        });

        Self {
            addr,
            store,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn connect(&self, token: &str) -> Result<Socket, tungstenite::Error> {
        let mut request = format!("ws://{}/ws", self.addr).into_client_request()?;
        let Ok(value) = HeaderValue::from_str(token) else {
            panic!("token should be a valid header value");
        };
        request.headers_mut().insert("x-session-token", value);
        connect_async(request).await.map(|(socket, _)| socket)
    }

    async fn connection_count(&self) -> u64 {
        let Ok(resp) = self.http.get(self.url("/health")).send().await else {
            panic!("health request failed");
        };
        let Ok(body) = resp.json::<serde_json::Value>().await else {
            panic!("health body should be JSON");
        };
        body["connections"].as_u64().unwrap_or_default()
    }

    async fn wait_for_connections(&self, expected: u64) {
        for _ in 0..100 {
            if self.connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("never reached {expected} live connections");
    }
}

/// Next text frame as JSON, skipping control frames.
async fn next_push(socket: &mut Socket) -> Option<serde_json::Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_millis(500), socket.next())
            .await
            .ok()??;
        match frame {
            Ok(Message::Text(text)) => return serde_json::from_str(text.as_str()).ok(),
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            _ => return None,
        }
    }
}

async fn send(socket: &mut Socket, json: &str) {
    tokio_test::assert_ok!(socket.send(Message::text(json)).await);
}

#[tokio::test]
async fn upgrade_without_session_is_rejected() {
    let app = TestApp::spawn().await;

    let result = connect_async(format!("ws://{}/ws", app.addr)).await;
    let Err(tungstenite::Error::Http(response)) = result else {
        panic!("upgrade without a session should fail with an HTTP error");
    };
    assert_eq!(response.status().as_u16(), 401);

    assert!(app.connect("stolen").await.is_err());
}

#[tokio::test]
async fn favorite_reaches_every_agent_socket_only() {
    let app = TestApp::spawn().await;
    let Ok(mut agent_a) = app.connect("agent-7").await else {
        panic!("agent connect");
    };
    let Ok(mut agent_b) = app.connect("agent-7").await else {
        panic!("agent connect");
    };
    let Ok(mut sender) = app.connect("user-9").await else {
        panic!("sender connect");
    };
    app.wait_for_connections(3).await;

    send(
        &mut sender,
        r#"{"type":"favorited_listing_notification","payload":{"listing_id":42,"address":"1 Main St"}}"#,
    )
    .await;

    for socket in [&mut agent_a, &mut agent_b] {
        let Some(push) = next_push(socket).await else {
            panic!("agent socket should receive a push");
        };
        assert_eq!(push["type"], "favorited_listing_notification");
        assert_eq!(push["payload"]["message"], "New favorite on 1 Main St");
    }
    assert!(next_push(&mut sender).await.is_none());

    let rows = app.store.notifications().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.first().map(|n| n.user_id), Some(UserId::new(7)));
}

#[tokio::test]
async fn price_drop_is_stored_for_all_and_pushed_to_connected() {
    let app = TestApp::spawn().await;
    let Ok(mut three) = app.connect("user-3").await else {
        panic!("user 3 connect");
    };
    let Ok(mut sender) = app.connect("user-9").await else {
        panic!("sender connect");
    };
    app.wait_for_connections(2).await;

    send(
        &mut sender,
        r#"{"type":"price_drop_notification","payload":{"listing_id":42,"address":"1 Main St","price":"$400,000"}}"#,
    )
    .await;

    let Some(push) = next_push(&mut three).await else {
        panic!("user 3 should receive a push");
    };
    assert_eq!(
        push["payload"]["message"],
        "Price Drop: 1 Main St was reduced to $400,000"
    );

    let mut owners: Vec<i64> = app
        .store
        .notifications()
        .await
        .iter()
        .map(|n| n.user_id.get())
        .collect();
    owners.sort_unstable();
    assert_eq!(owners, vec![3, 8]);
}

#[tokio::test]
async fn bad_frames_keep_the_connection_open() {
    let app = TestApp::spawn().await;
    let Ok(mut agent) = app.connect("agent-7").await else {
        panic!("agent connect");
    };
    let Ok(mut sender) = app.connect("user-9").await else {
        panic!("sender connect");
    };
    app.wait_for_connections(2).await;

    send(&mut sender, "not json").await;
    send(&mut sender, r#"{"type":"mystery","payload":{}}"#).await;
    send(
        &mut sender,
        r#"{"type":"favorited_listing_notification","payload":{"listing_id":"x"}}"#,
    )
    .await;
    send(
        &mut sender,
        r#"{"type":"favorited_listing_notification","payload":{"listing_id":42,"address":"9 Oak Ave"}}"#,
    )
    .await;

    let Some(push) = next_push(&mut agent).await else {
        panic!("the valid event after bad frames should still be handled");
    };
    assert_eq!(push["payload"]["message"], "New favorite on 9 Oak Ave");
    assert_eq!(app.connection_count().await, 2);
}

#[tokio::test]
async fn closing_the_socket_unregisters_it() {
    let app = TestApp::spawn().await;
    let Ok(mut socket) = app.connect("user-3").await else {
        panic!("connect");
    };
    app.wait_for_connections(1).await;

    tokio_test::assert_ok!(socket.close(None).await);
    app.wait_for_connections(0).await;
}

#[tokio::test]
async fn notifications_can_be_listed_and_toggled() {
    let app = TestApp::spawn().await;
    let Ok(mut sender) = app.connect("user-9").await else {
        panic!("sender connect");
    };
    app.wait_for_connections(1).await;
    send(
        &mut sender,
        r#"{"type":"status_changed_notification","payload":{"listing_id":42,"address":"1 Main St","status":"Pending"}}"#,
    )
    .await;

    let list_url = app.url("/api/v1/notifications");
    let mut listed = serde_json::Value::Null;
    for _ in 0..50 {
        let Ok(resp) = app
            .http
            .get(&list_url)
            .header("x-session-token", "user-3")
            .send()
            .await
        else {
            panic!("list request failed");
        };
        assert_eq!(resp.status().as_u16(), 200);
        let Ok(body) = resp.json::<serde_json::Value>().await else {
            panic!("list body should be JSON");
        };
        if body.as_array().is_some_and(|a| !a.is_empty()) {
            listed = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        listed[0]["message"],
        "Status Change: Status of 1 Main St was changed to Pending"
    );
    assert_eq!(listed[0]["type"], "status_changed_notification");
    assert_eq!(listed[0]["is_read"], false);
    let Some(id) = listed[0]["id"].as_i64() else {
        panic!("notification id should be numeric");
    };

    let toggle_url = app.url(&format!("/api/v1/notifications/{id}/read"));
    let Ok(resp) = app
        .http
        .patch(&toggle_url)
        .header("cookie", "session=user-3")
        .send()
        .await
    else {
        panic!("toggle request failed");
    };
    assert_eq!(resp.status().as_u16(), 200);
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        panic!("toggle body should be JSON");
    };
    assert_eq!(body["is_read"], true);

    let Ok(resp) = app
        .http
        .patch(&toggle_url)
        .header("x-session-token", "user-9")
        .send()
        .await
    else {
        panic!("toggle request failed");
    };
    assert_eq!(resp.status().as_u16(), 404);

    let Ok(resp) = app.http.get(&list_url).send().await else {
        panic!("list request failed");
    };
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn empty_list_is_an_array() {
    let app = TestApp::spawn().await;
    let Ok(resp) = app
        .http
        .get(app.url("/api/v1/notifications"))
        .header("x-session-token", "user-9")
        .send()
        .await
    else {
        panic!("list request failed");
    };
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        panic!("list body should be JSON");
    };
    assert_eq!(body, serde_json::json!([]));
}
