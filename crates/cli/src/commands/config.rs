use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use billroute_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::workflow::load_config;
use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigLine {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return failure.into_result("config"),
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let lines = effective_lines(&config, config_file_doc.as_ref(), config_file_path.as_deref());

    let mut rendered =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];
    rendered.extend(lines.iter().map(render_line));

    match serde_json::to_value(&lines) {
        Ok(data) => CommandResult::success_with_data("config", rendered.join("\n"), data),
        Err(error) => CommandResult::failure("config", "serialization", error.to_string(), 3),
    }
}

fn effective_lines(
    config: &AppConfig,
    doc: Option<&Value>,
    path: Option<&Path>,
) -> Vec<ConfigLine> {
    let line = |key: &'static str, value: String, env_key: &str| ConfigLine {
        key,
        value,
        source: field_source(key, Some(env_key), doc, path),
    };

    let departments = config
        .departments
        .routable()
        .map(|(code, name)| format!("{code}={name}"))
        .collect::<Vec<_>>()
        .join(",");

    vec![
        line("database.url", config.database.url.clone(), "BILLROUTE_DATABASE_URL"),
        line(
            "database.max_connections",
            config.database.max_connections.to_string(),
            "BILLROUTE_DATABASE_MAX_CONNECTIONS",
        ),
        line(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "BILLROUTE_DATABASE_TIMEOUT_SECS",
        ),
        line("llm.provider", format!("{:?}", config.llm.provider), "BILLROUTE_LLM_PROVIDER"),
        line("llm.model", config.llm.model.clone(), "BILLROUTE_LLM_MODEL"),
        line(
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "BILLROUTE_LLM_BASE_URL",
        ),
        line("llm.api_key", redact(config.llm.api_key.is_some()), "BILLROUTE_LLM_API_KEY"),
        line("routing.mode", format!("{:?}", config.routing.mode), "BILLROUTE_ROUTING_MODE"),
        line(
            "routing.pinned_department",
            config.routing.pinned_department.to_string(),
            "BILLROUTE_ROUTING_PINNED_DEPARTMENT",
        ),
        ConfigLine {
            key: "departments",
            value: departments,
            source: field_source("departments", None, doc, path),
        },
        line(
            "downstream.webhook_url",
            config.downstream.webhook_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "BILLROUTE_DOWNSTREAM_WEBHOOK_URL",
        ),
        line(
            "downstream.auth_token",
            redact(config.downstream.auth_token.is_some()),
            "BILLROUTE_DOWNSTREAM_AUTH_TOKEN",
        ),
        line("logging.level", config.logging.level.clone(), "BILLROUTE_LOGGING_LEVEL"),
        line(
            "logging.format",
            format!("{:?}", config.logging.format),
            "BILLROUTE_LOGGING_FORMAT",
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("billroute.toml"), PathBuf::from("config/billroute.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(line: &ConfigLine) -> String {
    format!("- {} = {} (source: {})", line.key, line.value, line.source)
}

fn redact(present: bool) -> String {
    if present { "<redacted>" } else { "<unset>" }.to_string()
}
