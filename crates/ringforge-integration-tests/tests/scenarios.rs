//! End-to-end scenarios against an in-process hub.

mod support;

use std::time::Duration;

use ringforge_store::DocumentStore;
use serde_json::json;
use support::{urlencode, TestHub};

fn agent_id_shape(s: &str) -> bool {
    s.strip_prefix("ag_")
        .is_some_and(|rest| rest.len() == 12 && rest.chars().all(|c| c.is_ascii_alphanumeric()))
}

// S1: register over a fresh socket, join the fleet, peers see the diff.
#[tokio::test]
async fn s1_register_and_join() {
    let hub = TestHub::start(|_| {}).await;

    let mut peer = hub.register("p1", &["code"]).await;
    peer.wait_event("presence:roster").await;

    let mut a1 = hub.register("a1", &["code"]).await;
    let roster = a1.wait_event("presence:roster").await;
    let agents = roster["payload"]["agents"].as_array().expect("roster list");
    assert!(
        agents.iter().any(|a| a["name"] == "a1"),
        "joining agent missing from its own roster: {roster}"
    );

    // The durable row has the opaque id shape.
    let a1_id = hub.agent_id_of("a1").await;
    assert!(agent_id_shape(&a1_id), "bad agent id {a1_id}");

    // The peer sees the join diff with state online. Skip the peer's own
    // join diff if it is still queued.
    let joined = loop {
        let frame = peer.wait_event("presence:joined").await;
        if frame["payload"]["name"] == "a1" {
            break frame;
        }
    };
    assert_eq!(joined["payload"]["state"], "online");
    assert_eq!(joined["payload"]["agent_id"], a1_id.as_str());

    a1.close().await;
    peer.close().await;
    hub.hub.shutdown().await;
}

// S2: a direct message to an offline agent is queued, then delivered exactly
// once on the target's next join and removed from the queue.
#[tokio::test]
async fn s2_direct_message_offline_then_online() {
    let hub = TestHub::start(|_| {}).await;

    // a2 registers once so the directory knows it, then goes offline.
    let a2_session = hub.register("a2", &[]).await;
    a2_session.close().await;
    let a2_id = hub.agent_id_of("a2").await;

    let mut a1 = hub.register("a1", &[]).await;
    a1.wait_event("presence:roster").await;

    a1.send(json!({
        "type": "direct:send",
        "payload": { "to": a2_id, "message": { "body": "hi", "priority": "high" } },
    }))
    .await;
    let reply = a1.wait_reply("direct:send").await;
    assert_eq!(reply["type"], "result", "send failed: {reply}");
    assert_eq!(reply["payload"]["status"], "queued");
    let message_id = reply["payload"]["message_id"]
        .as_str()
        .expect("message id")
        .to_owned();
    assert!(message_id.starts_with("msg_"));

    // The envelope sits in the document store under the queue key.
    let expected_key = format!("dmq:{}:{}:{}", hub.fleet_id, a2_id, message_id);
    let keys = hub.document_store.list_documents().await.unwrap();
    assert!(keys.contains(&expected_key), "queue key missing: {keys:?}");

    // a2 rejoins: exactly one push, then the queue record is gone.
    let mut a2 = hub.reconnect(&a2_id).await;
    let pushed = a2.wait_event("direct_message").await;
    assert_eq!(pushed["payload"]["message"]["body"], "hi");
    assert_eq!(pushed["payload"]["message_id"], message_id.as_str());
    a2.assert_no_event("direct_message", Duration::from_millis(400)).await;

    assert!(
        hub.document_store.list_documents().await.unwrap().is_empty(),
        "queue not drained"
    );

    a1.close().await;
    a2.close().await;
    hub.hub.shutdown().await;
}

// S3: a task no agent can take times out; the requester is notified and the
// failure is queryable through activity history.
#[tokio::test]
async fn s3_task_timeout() {
    let hub = TestHub::start(|config| {
        config.task_tick_ms = 100;
    })
    .await;

    let mut a1 = hub.register("a1", &["code"]).await;
    a1.wait_event("presence:roster").await;

    a1.send(json!({
        "type": "task:submit",
        "payload": {
            "type": "gen",
            "prompt": "x",
            "capabilities_required": ["quantum"],
            "ttl_ms": 500,
        },
    }))
    .await;
    let reply = a1.wait_reply("task:submit").await;
    let task_id = reply["payload"]["task_id"].as_str().expect("task id").to_owned();
    assert!(task_id.starts_with("task_"));

    let timeout_push = a1.wait_event("task:timeout").await;
    assert_eq!(timeout_push["payload"]["task_id"], task_id.as_str());
    assert_eq!(timeout_push["payload"]["status"], "timeout");

    // The task_failed activity is in history.
    tokio::time::sleep(Duration::from_millis(200)).await;
    a1.send(json!({
        "type": "activity:history",
        "payload": { "kinds": ["task_failed"] },
    }))
    .await;
    let history = a1.wait_reply("activity:history").await;
    assert_eq!(history["type"], "result");
    assert!(
        history["payload"]["count"].as_u64().unwrap_or(0) >= 1,
        "task_failed not in history: {history}"
    );

    a1.close().await;
    hub.hub.shutdown().await;
}

// S4: capability routing assigns to the matching agent and only to it.
#[tokio::test]
async fn s4_capability_routing() {
    let hub = TestHub::start(|config| {
        config.task_tick_ms = 100;
    })
    .await;

    let mut b = hub.register("b", &["code"]).await;
    b.wait_event("presence:roster").await;
    let mut c = hub.register("c", &["summarize"]).await;
    c.wait_event("presence:roster").await;

    b.send(json!({
        "type": "task:submit",
        "payload": { "type": "gen", "prompt": "x", "capabilities_required": ["code"] },
    }))
    .await;
    b.wait_reply("task:submit").await;

    let assigned = b.wait_event("task:assigned").await;
    assert_eq!(assigned["payload"]["type"], "gen");
    c.assert_no_event("task:assigned", Duration::from_millis(400)).await;

    b.close().await;
    c.close().await;
    hub.hub.shutdown().await;
}

// S5: challenge reconnect with an Ed25519 proof; the challenge is consumed.
#[tokio::test]
async fn s5_challenge_reconnect() {
    let hub = TestHub::start(|_| {}).await;

    let keypair = ringforge_crypto::KeyPair::generate();
    let session = hub
        .register_with_key("a", &["code"], Some(&keypair.public_key().to_base64()))
        .await;
    session.close().await;
    let agent_id = hub.agent_id_of("a").await;

    // Issue the challenge over the HTTP collaborator endpoint.
    let response = reqwest::Client::new()
        .post(format!("http://{}/auth/challenge", hub.addr))
        .json(&json!({ "agent_id": agent_id }))
        .send()
        .await
        .expect("challenge request");
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("challenge body");
    let challenge = body["challenge"].as_str().expect("challenge token");

    // Sign the decoded challenge bytes and reconnect with the proof.
    let bytes = ringforge_crypto::decode_challenge(challenge).expect("decode");
    let signature = keypair.sign(&bytes);
    let query = format!(
        "agent_id={}&challenge_response={}",
        urlencode(&agent_id),
        urlencode(&signature.to_base64())
    );
    let mut reconnected = hub.connect(&query).await;
    reconnected.wait_event("presence:roster").await;

    // The pending challenge was consumed.
    let parsed = ringforge_core::AgentId::parse(&agent_id).expect("id shape");
    assert!(
        hub.hub.state().directory.challenges().peek(&parsed).is_none(),
        "challenge still pending"
    );

    reconnected.close().await;
    hub.hub.shutdown().await;
}

// A malformed connect shape (bare agent_id) is refused with 401.
#[tokio::test]
async fn bare_agent_id_is_rejected() {
    let hub = TestHub::start(|_| {}).await;
    let url = format!("ws://{}/ws?agent_id=ag_AAAAAAAAAAAA", hub.addr);
    let result = tokio_tungstenite::connect_async(url.as_str()).await;
    assert!(result.is_err(), "bare agent_id connect was accepted");
    hub.hub.shutdown().await;
}

// S6: a streaming bus past its in-flight ceiling refuses publishes with
// backpressure while the scheduler keeps operating, and recovers once the
// backlog drains.
#[tokio::test]
async fn s6_bus_backpressure() {
    use ringforge_core::{AgentId, BusEvent, FleetId, PresenceEntry, SessionId, TaskPriority};
    use ringforge_events::{
        BusError, EventBus, InProcessBroker, PubSub, StreamingBroker, StreamingBus,
        StreamingConfig,
    };
    use ringforge_presence::PresenceRegistry;
    use ringforge_scheduler::{SchedulerConfig, TaskScheduler, TaskSubmission};
    use std::sync::Arc;

    let broker = Arc::new(InProcessBroker::new());
    let bus = Arc::new(StreamingBus::new(
        Arc::clone(&broker) as Arc<dyn StreamingBroker>,
        StreamingConfig {
            max_in_flight: 2,
            publish_timeout: Duration::from_secs(2),
            ..StreamingConfig::default()
        },
    ));
    fn event(topic: &str) -> BusEvent {
        BusEvent::new(topic.to_owned(), "alert", Some("k".to_owned()), json!({}))
    }

    let fleet_id = FleetId::new();
    let topic = format!("{fleet_id}.activity");

    // Prime topic creation, then hold two publishes open.
    bus.publish(&topic, event(&topic)).await.unwrap();
    broker.pause();
    let held1 = tokio::spawn({
        let bus = Arc::clone(&bus);
        let topic = topic.clone();
        async move {
            let held = event(&topic);
            bus.publish(&topic, held).await
        }
    });
    let held2 = tokio::spawn({
        let bus = Arc::clone(&bus);
        let topic = topic.clone();
        async move {
            let held = event(&topic);
            bus.publish(&topic, held).await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The third publish is refused outright.
    let refused = bus.publish(&topic, event(&topic)).await;
    assert!(matches!(refused, Err(BusError::Backpressure { .. })));

    // The scheduler still assigns work while the bus is saturated.
    let pubsub = Arc::new(PubSub::new());
    let presence = Arc::new(PresenceRegistry::new(Arc::clone(&pubsub)));
    let scheduler = TaskScheduler::new(
        Arc::clone(&presence),
        Arc::clone(&pubsub),
        Arc::clone(&bus) as Arc<dyn EventBus>,
        SchedulerConfig::default(),
    );
    let worker = AgentId::generate();
    presence.track(
        fleet_id,
        PresenceEntry::joined(SessionId::new(), worker.clone(), None, None, Default::default()),
    );
    let task = scheduler.submit(
        fleet_id,
        &AgentId::generate(),
        TaskSubmission {
            task_type: "gen".into(),
            prompt: "x".into(),
            capabilities_required: Default::default(),
            priority: TaskPriority::Normal,
            ttl_ms: None,
            correlation_id: None,
        },
    );
    scheduler.tick();
    assert_eq!(
        scheduler.store().get(&task.task_id).unwrap().assigned_to,
        Some(worker)
    );

    // Backlog drains; publishes flow again.
    broker.resume();
    assert!(held1.await.unwrap().is_ok());
    assert!(held2.await.unwrap().is_ok());
    assert!(
        bus.publish(&topic, BusEvent::new(&topic, "alert", Some("k".into()), json!({})))
            .await
            .is_ok()
    );
}
