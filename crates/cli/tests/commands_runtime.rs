use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::thread;

use billroute_cli::commands::{assign, config, details, escalate, migrate, seed, status};
use billroute_core::config::LoadOptions;
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    with_env(&[("BILLROUTE_DATABASE_URL", url.as_str())], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn hosted_provider_without_key_is_a_config_failure() {
    with_env(&[("BILLROUTE_LLM_PROVIDER", "openai")], || {
        let result = assign::run(LoadOptions::default(), "INV-1");
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "assign");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn unreachable_database_is_a_connectivity_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}/missing/billroute.db", dir.path().display());
    with_env(&[("BILLROUTE_DATABASE_URL", url.as_str())], || {
        let result = status::run(LoadOptions::default(), "INV-1");
        assert_eq!(result.exit_code, 4, "unexpected output: {}", result.output);
        assert_eq!(parse_payload(&result.output)["error_class"], "db_connectivity");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    with_env(&[("BILLROUTE_DATABASE_URL", url.as_str())], || {
        let first = seed::run(LoadOptions::default());
        assert_eq!(first.exit_code, 0, "expected first seed invocation success: {}", first.output);
        let second = seed::run(LoadOptions::default());
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["data"]["invoice_id"], "INV-DEMO-001");
        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn demo_invoice_walks_the_whole_chain() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    let llm = stub_ollama("1");
    with_env(
        &[("BILLROUTE_DATABASE_URL", url.as_str()), ("BILLROUTE_LLM_BASE_URL", llm.as_str())],
        || {
            assert_eq!(seed::run(LoadOptions::default()).exit_code, 0);

            let status_before = parse_payload(&status::run(LoadOptions::default(), DEMO).output);
            assert_eq!(status_before["data"]["state"], "new");

            let assigned = assign::run(LoadOptions::default(), DEMO);
            assert_eq!(assigned.exit_code, 0, "assign failed: {}", assigned.output);
            let assigned = parse_payload(&assigned.output);
            assert_eq!(assigned["data"]["approver"], 1);
            assert_eq!(assigned["data"]["category"], "hr");

            let pending = parse_payload(&status::run(LoadOptions::default(), DEMO).output);
            assert_eq!(pending["data"]["state"], "pending");
            assert_eq!(pending["data"]["level"], 1);

            let escalated = parse_payload(&escalate::run(LoadOptions::default(), DEMO).output);
            assert_eq!(escalated["data"]["outcome"], "escalated");
            assert_eq!(escalated["data"]["to"], 5);

            let completed = parse_payload(&escalate::run(LoadOptions::default(), DEMO).output);
            assert_eq!(completed["data"]["outcome"], "completed");
            assert_eq!(completed["data"]["purchase_order_number"], "PO-DEMO-001");
            assert_eq!(completed["data"]["notified"], true);

            let repeat = escalate::run(LoadOptions::default(), DEMO);
            assert_eq!(repeat.exit_code, 6);
            assert_eq!(parse_payload(&repeat.output)["error_class"], "already_completed");

            let done = parse_payload(&status::run(LoadOptions::default(), DEMO).output);
            assert_eq!(done["data"]["state"], "done");
        },
    );
}

#[test]
fn details_of_unknown_invoice_is_a_workflow_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    with_env(&[("BILLROUTE_DATABASE_URL", url.as_str())], || {
        let result = details::run(LoadOptions::default(), "INV-NOPE");
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "details");
        assert_eq!(payload["error_class"], "invoice_not_found");
    });
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(
        &[
            ("BILLROUTE_LLM_PROVIDER", "anthropic"),
            ("BILLROUTE_LLM_API_KEY", "sk-ant-very-secret"),
            ("BILLROUTE_LLM_MODEL", "claude-3-5-haiku-latest"),
        ],
        || {
            let result = config::run(LoadOptions::default());
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
            assert!(!result.output.contains("very-secret"));

            let payload = parse_payload(&result.output);
            let lines = payload["data"].as_array().cloned().unwrap_or_default();
            let api_key = lines.iter().find(|line| line["key"] == "llm.api_key").cloned();
            let api_key = api_key.expect("llm.api_key line");
            assert_eq!(api_key["value"], "<redacted>");
            assert_eq!(api_key["source"], "env (BILLROUTE_LLM_API_KEY)");

            let level = lines.iter().find(|line| line["key"] == "logging.level").cloned();
            assert_eq!(level.expect("logging.level line")["source"], "default");
        },
    );
}

const DEMO: &str = "INV-DEMO-001";

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("billroute.db").display())
}

/// Answers every request with a fixed Ollama generate response.
fn stub_ollama(answer: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub llm");
    let address = listener.local_addr().expect("stub address");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            let mut buffer = Vec::new();
            let mut chunk = [0_u8; 4096];
            while let Ok(read) = stream.read(&mut chunk) {
                if read == 0 {
                    break;
                }
                buffer.extend_from_slice(&chunk[..read]);
                if request_complete(&buffer) {
                    break;
                }
            }

            let body = format!(r#"{{"response":"{answer}","done":true}}"#);
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    format!("http://{address}")
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

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "BILLROUTE_DATABASE_URL",
        "BILLROUTE_DATABASE_MAX_CONNECTIONS",
        "BILLROUTE_DATABASE_TIMEOUT_SECS",
        "BILLROUTE_LLM_PROVIDER",
        "BILLROUTE_LLM_API_KEY",
        "BILLROUTE_LLM_BASE_URL",
        "BILLROUTE_LLM_MODEL",
        "BILLROUTE_LLM_TIMEOUT_SECS",
        "BILLROUTE_ROUTING_MODE",
        "BILLROUTE_ROUTING_PINNED_DEPARTMENT",
        "BILLROUTE_DOWNSTREAM_WEBHOOK_URL",
        "BILLROUTE_DOWNSTREAM_AUTH_TOKEN",
        "BILLROUTE_DOWNSTREAM_TIMEOUT_SECS",
        "BILLROUTE_LOGGING_LEVEL",
        "BILLROUTE_LOGGING_FORMAT",
        "BILLROUTE_LOG_LEVEL",
        "BILLROUTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
