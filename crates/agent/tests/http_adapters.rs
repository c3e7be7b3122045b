use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use billroute_agent::{HttpLlmClient, PromptClassifier, WebhookApprover};
use billroute_core::config::{LlmConfig, LlmProvider};
use billroute_core::domain::department::DepartmentTable;
use billroute_core::domain::invoice::InvoiceId;
use billroute_core::downstream::{DownstreamApprover, DownstreamError};
use billroute_core::routing::Classifier;

/// Accepts one connection, answers it, and yields the raw request text.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let read = stream.read(&mut chunk).await.expect("read");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if request_complete(&buffer) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.expect("write");
        stream.shutdown().await.ok();
        String::from_utf8_lossy(&buffer).into_owned()
    });

    (format!("http://{address}"), handle)
}

fn request_complete(buffer: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buffer);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    buffer.len() >= header_end + 4 + content_length
}

#[tokio::test]
async fn webhook_posts_invoice_with_bearer_token() {
    let (base, server) = serve_once("200 OK", "{}").await;
    let approver = WebhookApprover::new(
        format!("{base}/bills/approve"),
        Some("secret-token".to_string().into()),
        Duration::from_secs(5),
    )
    .expect("build approver");

    approver
        .approve_pending_invoice(&InvoiceId("INV-1".into()), Some("PO-1"))
        .await
        .expect("delivered");

    let request = server.await.expect("server task");
    let lowered = request.to_ascii_lowercase();
    assert!(lowered.starts_with("post /bills/approve "));
    assert!(lowered.contains("authorization: bearer secret-token"));
    assert!(request.contains(r#""invoice_id":"INV-1""#));
    assert!(request.contains(r#""purchase_order_number":"PO-1""#));
}

#[tokio::test]
async fn webhook_error_status_is_rejected() {
    let (base, server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
    let approver =
        WebhookApprover::new(base, None, Duration::from_secs(5)).expect("build approver");

    let error = approver
        .approve_pending_invoice(&InvoiceId("INV-2".into()), None)
        .await
        .expect_err("server failure");
    assert!(matches!(error, DownstreamError::Rejected { status: 500, ref body } if body.contains("boom")));

    let request = server.await.expect("server task");
    assert!(request.contains(r#""purchase_order_number":null"#));
}

#[tokio::test]
async fn unreachable_webhook_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    drop(listener);

    let approver = WebhookApprover::new(format!("http://{address}"), None, Duration::from_secs(2))
        .expect("build approver");
    let error = approver
        .approve_pending_invoice(&InvoiceId("INV-3".into()), None)
        .await
        .expect_err("nothing listening");
    assert!(matches!(error, DownstreamError::Transport(_)));
}

#[tokio::test]
async fn ollama_classifier_round_trip() {
    let (base, server) = serve_once("200 OK", r#"{"response":" 3\n","done":true}"#).await;
    let client = HttpLlmClient::from_config(&LlmConfig {
        provider: LlmProvider::Ollama,
        api_key: None,
        base_url: Some(base),
        model: "llama3.1".to_string(),
        timeout_secs: 5,
    })
    .expect("build client");
    let classifier = PromptClassifier::new(client);

    let answer = classifier
        .classify(&[json!({ "name": "USB-C dock" })], &DepartmentTable::default())
        .await
        .expect("classify");
    assert_eq!(answer.trim(), "3");

    let request = server.await.expect("server task");
    assert!(request.starts_with("POST /api/generate "));
    assert!(request.contains("USB-C dock"));
    assert!(request.contains(r#""stream":false"#));
}
