//! Drives an all-in-one gateway over real HTTP through the orchestrator's
//! HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use ticketdesk::config::{Config, EndpointsConfig, TransportConfig};
use ticketdesk::gateway::{build_app, AppState, ServiceRole};
use ticketdesk::orchestrator::{HttpTransport, Orchestrator, ProcessOutcome};
use ticketdesk::queue::{InMemoryQueue, MessageQueue, SqliteQueue};
use ticketdesk::tickets::{Ticket, ESCALATION_QUEUE, MANAGER_APPROVAL_QUEUE, TECHNICAL_AGENT};

struct TestServer {
    url: String,
    queue: Arc<dyn MessageQueue>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn start_server(queue: Arc<dyn MessageQueue>, role: ServiceRole) -> TestServer {
    let config = Config::default();
    let state = AppState::new(&config, queue, role).unwrap();
    let queue = Arc::clone(&state.queue);
    let app = build_app(state, &config.gateway);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            eprintln!("test server error: {e}");
        }
    });

    TestServer {
        url,
        queue,
        shutdown_tx: Some(shutdown_tx),
    }
}

fn orchestrator_for(server: &TestServer) -> Orchestrator {
    let endpoints = EndpointsConfig::single_gateway(&server.url);
    let transport = TransportConfig {
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
    };
    Orchestrator::new(Arc::new(HttpTransport::new(&endpoints, &transport).unwrap()))
}

fn database_outage() -> Ticket {
    Ticket::new(
        "TKT-9001",
        "analyst@example.com",
        "Risk Management",
        "Oracle database timeout",
        "connection refused",
    )
}

#[tokio::test]
async fn database_outage_flows_through_http_services() {
    let server = start_server(Arc::new(InMemoryQueue::new()), ServiceRole::All).await;
    let orchestrator = orchestrator_for(&server);

    let outcome = orchestrator.process(database_outage()).await;
    let ProcessOutcome::Completed {
        conversation,
        final_response,
        escalated,
        ..
    } = outcome.clone()
    else {
        panic!("expected completed outcome, got {outcome:?}");
    };

    assert!(escalated);
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].result["category"], "technical");
    assert_eq!(conversation[0].result["priority"], "high");
    assert_eq!(conversation[0].result["assigned_agent"], TECHNICAL_AGENT);
    assert_eq!(conversation[1].result["status"], "handled");
    assert!(final_response.contains("Contact DBA team"));

    assert_eq!(server.queue.depth(ESCALATION_QUEUE).await.unwrap(), 1);
    assert_eq!(server.queue.depth("technical_agent_queue").await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_department_permission_review_is_an_error_envelope() {
    let server = start_server(Arc::new(InMemoryQueue::new()), ServiceRole::All).await;
    let orchestrator = orchestrator_for(&server);

    let ticket = Ticket::new(
        "TKT-9002",
        "ops@example.com",
        "Facilities",
        "Permission review",
        "please check my access permissions",
    );
    let json = serde_json::to_value(orchestrator.process(ticket).await).unwrap();

    assert_eq!(json["status"], "error");
    assert_eq!(json["ticket_id"], "TKT-9002");
    assert_eq!(json["conversation"].as_array().unwrap().len(), 1);
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("404"), "{error}");
    assert!(error.contains("department not found: Facilities"), "{error}");
}

#[tokio::test]
async fn handler_endpoints_map_errors_to_status_codes() {
    let server = start_server(Arc::new(InMemoryQueue::new()), ServiceRole::All).await;
    let client = reqwest::Client::new();

    let mut ticket = serde_json::to_value(database_outage()).unwrap();
    ticket["user_email"] = json!("not-an-email");
    let response = client
        .post(format!("{}/route_ticket", server.url))
        .json(&ticket)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("user_email"));

    let response = client
        .post(format!("{}/route_ticket", server.url))
        .json(&json!({ "ticket_id": "T-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);

    let unknown = Ticket::new("T-2", "a@b.co", "Facilities", "Permissions", "access review");
    let response = client
        .post(format!("{}/account/handle_ticket", server.url))
        .json(&json!({ "ticket": unknown }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "department not found: Facilities");
}

#[tokio::test]
async fn oversized_body_is_rejected_with_json_error() {
    let server = start_server(Arc::new(InMemoryQueue::new()), ServiceRole::All).await;
    let client = reqwest::Client::new();

    let mut ticket = database_outage();
    ticket.description = "x".repeat(70 * 1024);
    let response = client
        .post(format!("{}/route_ticket", server.url))
        .json(&ticket)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 413);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "request body exceeds the size limit" }));
    assert_eq!(server.queue.depth("technical_agent_queue").await.unwrap(), 0);
}

#[tokio::test]
async fn created_at_without_offset_is_accepted() {
    let server = start_server(Arc::new(InMemoryQueue::new()), ServiceRole::All).await;
    let client = reqwest::Client::new();

    let mut ticket = serde_json::to_value(database_outage()).unwrap();
    ticket["created_at"] = json!("2024-05-01T09:30:00.123456");
    let response = client
        .post(format!("{}/route_ticket", server.url))
        .json(&ticket)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["category"], "technical");
}

#[tokio::test]
async fn process_endpoint_and_observability_routes() {
    let server = start_server(Arc::new(InMemoryQueue::new()), ServiceRole::All).await;
    let client = reqwest::Client::new();

    let ticket = Ticket::new(
        "TKT-9003",
        "lead@example.com",
        "Trading",
        "Add users",
        "please add 60 new users",
    );
    let envelope: Value = client
        .post(format!("{}/process", server.url))
        .json(&ticket)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(envelope["status"], "completed");
    assert_eq!(envelope["escalated"], true);
    assert!(envelope["final_response"]
        .as_str()
        .unwrap()
        .contains("Manager Approval Required"));

    let depth: Value = client
        .get(format!("{}/queues/{MANAGER_APPROVAL_QUEUE}", server.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(depth, json!({ "channel": MANAGER_APPROVAL_QUEUE, "depth": 1 }));

    let health: Value = client
        .get(format!("{}/health", server.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({ "status": "ok", "role": "all" }));

    let metrics = client
        .get(format!("{}/metrics", server.url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains(
        r#"ticketdesk_tickets_routed_total{category="account",priority="high"} 1"#
    ));
    assert!(metrics.contains(
        r#"ticketdesk_tickets_handled_total{agent="account_agent",escalated="true"} 1"#
    ));
    assert!(metrics.contains(r#"ticketdesk_queue_pushes_total{channel="manager_approval_queue"} 1"#));
}

#[tokio::test]
async fn single_role_gateway_only_serves_its_endpoint() {
    let server = start_server(Arc::new(InMemoryQueue::new()), ServiceRole::Technical).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/handle_ticket", server.url))
        .json(&json!({ "ticket": database_outage() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"]["agent_name"], TECHNICAL_AGENT);

    let response = client
        .post(format!("{}/route_ticket", server.url))
        .json(&database_outage())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn durable_queue_keeps_escalations_after_gateway_stops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let pop_timeout = Duration::from_millis(200);

    {
        let queue = Arc::new(SqliteQueue::open(&path, pop_timeout).unwrap());
        let server = start_server(queue, ServiceRole::All).await;
        let outcome = orchestrator_for(&server).process(database_outage()).await;
        assert!(outcome.is_completed());
    }

    let reopened = SqliteQueue::open(&path, pop_timeout).unwrap();
    let entry = reopened.pop(ESCALATION_QUEUE).await.unwrap().unwrap();
    assert_eq!(entry["ticket"]["ticket_id"], "TKT-9001");
    assert_eq!(entry["escalated_by"], TECHNICAL_AGENT);
    assert!(reopened.pop(ESCALATION_QUEUE).await.unwrap().is_none());
}
