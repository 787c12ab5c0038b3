use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, HeaderValue, LINK};
use reqwest::{Method, Request, Url};
use tracing::error;

use crate::error::ConnectorError;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::model::{RawEvent, VehicleEntity};
use crate::services::{EventFetcher, PAGE_SIZE};

const ENTITY_TYPE: &str = "Vehicle";

const CONTEXT_LINK: &str = r#"<https://raw.githubusercontent.com/smart-data-models/data-models/master/context.jsonld>; rel="http://www.w3.org/ns/json-ld#context"; type="application/ld+json""#;

/// Reads `Vehicle` entities from an NGSI-LD context broker.
pub struct BrokerClient<C> {
    http: C,
    entities_url: Url,
}

impl<C> BrokerClient<C> {
    pub fn new(http: C, base_url: &str) -> Result<Self> {
        let entities_url = format!("{}/ngsi-ld/v1/entities/", base_url.trim_end_matches('/'));
        let entities_url = Url::parse(&entities_url)
            .with_context(|| format!("invalid broker URL '{base_url}'"))?;

        Ok(Self { http, entities_url })
    }

    /// Query for one page of vehicles observed at or after `begin`.
    pub fn entities_request(&self, begin: DateTime<Utc>, offset: usize) -> Request {
        let mut url = self.entities_url.clone();
        url.query_pairs_mut()
            .append_pair("type", ENTITY_TYPE)
            .append_pair("limit", &PAGE_SIZE.to_string())
            .append_pair(
                "q",
                &format!(
                    "location.observedAt>={}",
                    begin.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            )
            .append_pair("offset", &offset.to_string());

        let mut req = Request::new(Method::GET, url);
        let headers = req.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(LINK, HeaderValue::from_static(CONTEXT_LINK));
        req
    }
}

/// Decodes a broker response body into events.
pub fn decode_page(body: &[u8]) -> Result<Vec<RawEvent>, ConnectorError> {
    let entities: Vec<VehicleEntity> = serde_json::from_slice(body)?;
    Ok(entities.into_iter().map(RawEvent::from).collect())
}

#[async_trait]
impl<C: HttpClient> EventFetcher for BrokerClient<C> {
    #[tracing::instrument(skip(self), fields(component = "ngsi-ld client"))]
    async fn fetch_data(
        &self,
        begin: DateTime<Utc>,
        offset: usize,
    ) -> Result<Vec<RawEvent>, ConnectorError> {
        let req = self.entities_request(begin, offset);

        let body = fetch_bytes(&self.http, req).await.inspect_err(|e| {
            error!(error = %e, "can't read vehicles from broker");
        })?;

        decode_page(&body).inspect_err(|e| {
            error!(error = %e, "error decoding vehicles");
        })
    }
}
