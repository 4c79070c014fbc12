use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "LETTA_API_KEY is required; export it, add it to a .env file, or set env.LETTA_API_KEY in the Letta settings file"
    )]
    MissingApiKey,
    #[error("agent id is required; pass --agent-id or set LETTA_AGENT_ID")]
    MissingAgentId,
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum LettaApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}
