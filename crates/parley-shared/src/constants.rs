/// Application name
pub const APP_NAME: &str = "Parley";

/// Path prefix of every REST endpoint
pub const API_PREFIX: &str = "/api";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Chat titles derived from a first message keep at most this many characters
pub const TITLE_MAX_CHARS: usize = 30;

/// Appended to a derived title when the message was cut
pub const TITLE_ELLIPSIS: &str = "...";

/// Process-wide generation defaults
pub const DEFAULT_MODEL: &str = "GigaChat";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// OAuth scope requested during the credential exchange
pub const DEFAULT_TOKEN_SCOPE: &str = "GIGACHAT_API_PERS";

/// Correlation header sent with every credential exchange
pub const REQUEST_ID_HEADER: &str = "RqUID";
