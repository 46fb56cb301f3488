//! Synchronous HTTP GET with a hard timeout and per-host TLS policy.
//!
//! Two of the upstream radar endpoints serve certificates on non-443 ports
//! that do not validate; rather than disabling certificate verification
//! globally, the relaxed policy is scoped to exactly those hostnames.

use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{RadarError, Result};

const TIMEOUT: Duration = Duration::from_millis(20_000);
const USER_AGENT: &str = concat!("radar-mosaic/", env!("CARGO_PKG_VERSION"));

/// Hosts known to serve radar data behind non-validating TLS. Verification
/// is disabled only for requests to these hosts, never globally.
const INSECURE_HOSTS: &[&str] = &["radar.bmkg.go.id", "api-apps.bmkg.go.id"];

static CLIENT: OnceLock<reqwest::blocking::Client> = OnceLock::new();
static INSECURE_CLIENT: OnceLock<reqwest::blocking::Client> = OnceLock::new();

pub(crate) fn is_insecure_host(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| INSECURE_HOSTS.contains(&h)))
        .unwrap_or(false)
}

fn client_for(url: &str) -> &'static reqwest::blocking::Client {
    if is_insecure_host(url) {
        INSECURE_CLIENT.get_or_init(|| {
            reqwest::blocking::Client::builder()
                .danger_accept_invalid_certs(true)
                .timeout(TIMEOUT)
                .user_agent(USER_AGENT)
                .build()
                .expect("failed to build insecure http client")
        })
    } else {
        CLIENT.get_or_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(TIMEOUT)
                .user_agent(USER_AGENT)
                .build()
                .expect("failed to build http client")
        })
    }
}

/// Fetches `url`, failing with [`RadarError::NetworkError`] on timeout,
/// transport failure, or a non-2xx status. Does not retry; callers own
/// retry policy.
pub fn get(url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>> {
    let net_err = |cause: reqwest::Error| RadarError::NetworkError {
        url: url.to_string(),
        cause: cause.to_string(),
    };

    let mut request = client_for(url).get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().map_err(net_err)?;
    let response = response.error_for_status().map_err(net_err)?;
    let bytes = response.bytes().map_err(net_err)?;
    Ok(bytes.to_vec())
}
