//! Outbound HTTP transport through a single proxy
//!
//! One attempt = one client bound to one proxy. The per-hop connect timeout
//! and the per-attempt request timeout are independent knobs; a hard outer
//! abort fires a fixed grace period after the nominal timeout in case the
//! client's own timer never resolves.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use crate::error::{BalancerError, Result};
use crate::models::{ProxyAddress, ProxyResponse, RequestOptions};

/// Margin past the nominal timeout before the attempt is hard-aborted
pub(crate) const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// Issue one request to `url` through `proxy`.
///
/// Status policy: anything below 500 is returned to the caller, except 403,
/// which almost always means the proxy itself rejected the request and is
/// escalated to a transport failure. 500 and above fail the attempt.
/// The body is read to completion before returning.
pub(crate) async fn fetch_via_proxy(
    url: &str,
    options: &RequestOptions,
    proxy: &ProxyAddress,
    timeout: Duration,
    proxy_timeout: Duration,
) -> Result<ProxyResponse> {
    let dialer = reqwest::Proxy::all(proxy.as_str())?;
    let client = reqwest::Client::builder()
        .proxy(dialer)
        .connect_timeout(proxy_timeout)
        .timeout(timeout)
        .build()?;

    let mut request = client
        .request(options.method.clone(), url)
        .headers(options.headers.clone());
    if let Some(body) = &options.body {
        request = request.body(body.clone());
    }

    let attempt = async {
        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() >= 500 || status == StatusCode::FORBIDDEN {
            debug!(status = status.as_u16(), "disallowed upstream status");
            return Err(BalancerError::BadStatus {
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(ProxyResponse {
            status,
            headers,
            body,
            url: final_url,
        })
    };

    match tokio::time::timeout(timeout + TIMEOUT_GRACE, attempt).await {
        Ok(result) => result,
        Err(_) => Err(BalancerError::Timeout),
    }
}
