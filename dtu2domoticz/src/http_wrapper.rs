use std::time::Duration;

use crate::error::TransportError;

#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Upper bound for a single request, connect included.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            user_agent: concat!("opendtu-domoticz/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpWrapper {
    // This trait decouples the library from an HTTP client implementation.
    // The binary wraps its client in a new type implementing this trait, tests
    // use a recording fake.

    /// Single GET, no retry. Any HTTP status counts as a response.
    fn get(&mut self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TransportError>;

    fn new(config: &HttpConfig) -> Self;
}
