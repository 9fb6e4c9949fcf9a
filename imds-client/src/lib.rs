// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client for the instance metadata service
//!
//! Speaks the session-oriented (IMDSv2) protocol: every query is preceded by
//! a `PUT` for a short-lived session token, which is then presented with the
//! query itself. Tokens are not kept between queries.

use async_trait::async_trait;
use display_error_chain::DisplayErrorChain;
use sg_reconciler::Error;
use sg_reconciler::inventory::SelfMetadata;
use slog::Logger;
use slog::debug;
use std::time::Duration;

/// Where the metadata service lives on every instance
pub const DEFAULT_BASE_URL: &str = "http://169.254.169.254";

const TOKEN_PATH: &str = "/latest/api/token";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: u32 = 60;

const PUBLIC_IPV4_PATH: &str = "/latest/meta-data/public-ipv4";
const REGION_PATH: &str = "/latest/meta-data/placement/region";

// The service is link-local; if it hasn't answered by now we're not on an
// instance.
const TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ImdsError {
    #[error("failed to build HTTP client")]
    BuildClient(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        err: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status { url: String, status: reqwest::StatusCode },
}

impl ImdsError {
    fn is_not_found(&self) -> bool {
        matches!(
            self,
            ImdsError::Status { status, .. }
                if *status == reqwest::StatusCode::NOT_FOUND
        )
    }
}

#[derive(Debug)]
pub struct Client {
    base_url: String,
    client: reqwest::Client,
    log: Logger,
}

impl Client {
    pub fn new(base_url: &str, log: Logger) -> Result<Client, ImdsError> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(TIMEOUT)
            .timeout(TIMEOUT)
            .build()
            .map_err(ImdsError::BuildClient)?;
        Ok(Client::new_with_client(base_url, client, log))
    }

    pub fn new_with_client(
        base_url: &str,
        client: reqwest::Client,
        log: Logger,
    ) -> Client {
        Client {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            log,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one metadata item, e.g. `/latest/meta-data/instance-id`.
    pub async fn get_metadata(&self, path: &str) -> Result<String, ImdsError> {
        let token = self.session_token().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!(self.log, "querying instance metadata"; "url" => &url);
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|err| ImdsError::Request { url: url.clone(), err })?;
        response_text(url, response).await
    }

    pub async fn public_ipv4(&self) -> Result<String, ImdsError> {
        self.get_metadata(PUBLIC_IPV4_PATH).await
    }

    pub async fn region(&self) -> Result<String, ImdsError> {
        self.get_metadata(REGION_PATH).await
    }

    async fn session_token(&self) -> Result<String, ImdsError> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let response = self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS.to_string())
            .send()
            .await
            .map_err(|err| ImdsError::Request { url: url.clone(), err })?;
        response_text(url, response).await
    }
}

async fn response_text(
    url: String,
    response: reqwest::Response,
) -> Result<String, ImdsError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ImdsError::Status { url, status });
    }
    response.text().await.map_err(|err| ImdsError::Request { url, err })
}

fn unavailable(error: &ImdsError) -> Error {
    Error::unavailable(
        "instance metadata",
        DisplayErrorChain::new(error).to_string(),
    )
}

#[async_trait]
impl SelfMetadata for Client {
    async fn own_public_address(&self) -> Result<String, Error> {
        match self.public_ipv4().await {
            Ok(address) => Ok(address),
            Err(error) if error.is_not_found() => Err(Error::unavailable(
                "instance metadata",
                "this instance has no public IPv4 address",
            )),
            Err(error) => Err(unavailable(&error)),
        }
    }

    async fn region(&self) -> Result<String, Error> {
        Client::region(self).await.map(|r| r.trim().to_string()).map_err(
            |error| unavailable(&error),
        )
    }
}
