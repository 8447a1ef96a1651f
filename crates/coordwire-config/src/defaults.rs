use crate::endpoint::Endpoint;

/// Port the coordination store listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 8046;

/// Host used when no endpoint is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Largest frame accepted or produced by default (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Log filter applied when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default endpoint: the store on the local host.
#[must_use]
pub fn default_endpoint() -> Endpoint {
    Endpoint::tcp(DEFAULT_HOST, DEFAULT_PORT)
}

/// Default frame ceiling.
#[must_use]
pub const fn default_max_frame_bytes() -> u32 {
    DEFAULT_MAX_FRAME_BYTES
}
