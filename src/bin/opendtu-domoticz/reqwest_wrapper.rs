use dtu2domoticz::{
    error::TransportError,
    http_wrapper::{self, HttpConfig, HttpResponse},
};
use log::warn;
use reqwest::blocking::Client;

pub struct ReqwestWrapper {
    // a client that failed to build turns every request into a connect error
    client: Result<Client, String>,
}

fn match_error(e: reqwest::Error) -> TransportError {
    // urls may carry the telegram bot token
    let e = e.without_url();
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Connect(e.to_string())
    }
}

impl http_wrapper::HttpWrapper for ReqwestWrapper {
    fn get(&mut self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TransportError> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| TransportError::Connect(e.clone()))?;

        let response = client.get(url).query(query).send().map_err(match_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(match_error)?;
        Ok(HttpResponse { status, body })
    }

    fn new(config: &HttpConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                warn!("could not build http client: {e}");
                e.to_string()
            });
        Self { client }
    }
}
