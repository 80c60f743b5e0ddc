use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Base builder for outbound HTTP. Certificates are validated; callers that
/// need otherwise must opt out on their own builder.
pub fn base_builder(timeout: Duration) -> ClientBuilder {
    ClientBuilder::new()
        // Timeouts
        .timeout(timeout)
        .connect_timeout(timeout)

        // No pooling: every probe targets a different host
        .pool_max_idle_per_host(0)
        .tcp_nodelay(true)

        .use_rustls_tls()
        .https_only(false)
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(USER_AGENT)
}

pub fn create_client(timeout: Duration) -> reqwest::Result<Client> {
    base_builder(timeout).build()
}
