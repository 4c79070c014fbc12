use anyhow::Result;
use std::env;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::history::config::{load_config, resolve_config_path, validate};
use crate::history::source::HistorySource;
use crate::letta::client::LettaClient;
use crate::letta::credentials::{load_settings, mask_secret, resolve_credentials, settings_path};

include!(concat!(env!("OUT_DIR"), "/letta_env_allowlist.rs"));

#[derive(Debug, Clone, Default)]
pub struct DoctorOptions {
    pub agent_id: Option<String>,
}

fn environment_report() -> CommandReport {
    let mut report = CommandReport::new("doctor-environment");

    match settings_path() {
        Some(path) if path.is_file() => {
            let settings = load_settings();
            report.detail(format!(
                "settings_file={} ({} env entries)",
                path.display(),
                settings.env_len()
            ));
        }
        Some(path) => report.detail(format!("settings_file={} (missing)", path.display())),
        None => report.detail("settings_file=unresolved (no home directory)"),
    }

    match resolve_config_path() {
        Some(path) if path.is_file() => report.detail(format!("config_file={}", path.display())),
        Some(path) => report.detail(format!("config_file={} (missing, defaults)", path.display())),
        None => report.detail("config_file=unresolved (defaults)"),
    }

    let set_vars = GENERATED_LETTA_ENV_ALLOWLIST
        .iter()
        .filter(|key| env::var_os(key).is_some())
        .copied()
        .collect::<Vec<_>>();
    if set_vars.is_empty() {
        report.detail("env_vars_set=none");
    } else {
        report.detail(format!("env_vars_set={}", set_vars.join(",")));
    }

    match load_config().and_then(|cfg| validate(&cfg).map(|_| cfg)) {
        Ok(cfg) => report.detail(format!(
            "limits: page_limit={} max_pages={} max_output_chars={} months={} concurrency={}",
            cfg.limits.page_limit,
            cfg.limits.max_pages_per_chunk,
            cfg.limits.max_output_chars,
            cfg.run.months,
            cfg.run.concurrency
        )),
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    report
}

async fn connection_report(opts: &DoctorOptions) -> CommandReport {
    let mut report = CommandReport::new("doctor-connection");

    let credentials = match resolve_credentials(opts.agent_id.as_deref()) {
        Ok(credentials) => credentials,
        Err(err) => {
            report.issue(err.to_string());
            return report;
        }
    };

    report.detail(format!(
        "api_key={} (source: {})",
        mask_secret(&credentials.api_key),
        credentials.api_key_source.as_str()
    ));
    report.detail(format!(
        "base_url={} (source: {})",
        credentials.base_url,
        credentials.base_url_source.as_str()
    ));
    report.detail(format!(
        "agent_id={} (source: {})",
        credentials.agent_id,
        credentials.agent_id_source.as_str()
    ));

    let timeout = load_config()
        .map(|cfg| cfg.run.request_timeout_secs)
        .unwrap_or(45)
        .max(1);
    let client = match LettaClient::new(&credentials, Duration::from_secs(timeout)) {
        Ok(client) => client,
        Err(err) => {
            report.issue(format!("http client unavailable: {err:#}"));
            return report;
        }
    };

    match client.list_conversations(&credentials.agent_id).await {
        Ok(conversations) => {
            report.detail(format!("conversations: ok ({} listed)", conversations.len()))
        }
        Err(err) => report.issue(format!("conversations: {err}")),
    }

    report
}

pub async fn run(opts: &DoctorOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("doctor");
    report.merge(environment_report());
    report.merge(connection_report(opts).await);
    Ok(report)
}
