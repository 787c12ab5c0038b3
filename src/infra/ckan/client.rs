use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use tracing::{error, info};

use crate::error::ConnectorError;
use crate::fetch::{HttpClient, fetch_json};
use crate::model::ckan::{ActionResponse, SearchRequest, SearchResult, UpsertRequest};
use crate::model::{GateCount, parse_timestamp};
use crate::pipeline::Window;
use crate::services::{RecordSink, WatermarkSource};

const NEWEST_FIRST: &str = "endObservation desc";

/// `method` hint sent with `datastore_upsert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WriteMethod {
    /// Plain insert. Idempotence then relies on the resource's primary key.
    #[default]
    Insert,
    /// Insert-or-replace on the resource's primary key.
    Upsert,
}

impl WriteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMethod::Insert => "insert",
            WriteMethod::Upsert => "upsert",
        }
    }
}

/// CKAN DataStore resource holding the gate counts. Serves both as the
/// watermark source and as the record sink.
pub struct CkanClient<C> {
    http: C,
    search_url: Url,
    upsert_url: Url,
    resource_id: String,
    method: WriteMethod,
    window: Window,
}

impl<C> CkanClient<C> {
    pub fn new(
        http: C,
        base_url: &str,
        resource_id: impl Into<String>,
        method: WriteMethod,
        window: Window,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        let action = |name: &str| {
            Url::parse(&format!("{base_url}/api/3/action/{name}"))
                .with_context(|| format!("invalid CKAN URL '{base_url}'"))
        };

        Ok(Self {
            http,
            search_url: action("datastore_search")?,
            upsert_url: action("datastore_upsert")?,
            resource_id: resource_id.into(),
            method,
            window,
        })
    }

    /// `datastore_search` request for the single newest bucket.
    pub fn search_request(&self) -> Result<Request, ConnectorError> {
        let body = SearchRequest {
            resource_id: &self.resource_id,
            limit: 1,
            sort: NEWEST_FIRST,
        };
        json_post(self.search_url.clone(), &body)
    }

    /// `datastore_upsert` request carrying `records`.
    pub fn upsert_request(&self, records: &[GateCount]) -> Result<Request, ConnectorError> {
        let body = UpsertRequest {
            resource_id: &self.resource_id,
            force: true,
            method: self.method.as_str(),
            records,
        };
        json_post(self.upsert_url.clone(), &body)
    }
}

fn json_post(url: Url, body: &impl serde::Serialize) -> Result<Request, ConnectorError> {
    let mut req = Request::new(Method::POST, url);
    req.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());
    Ok(req)
}

fn ensure_success<T>(response: &ActionResponse<T>) -> Result<(), ConnectorError> {
    if response.success {
        return Ok(());
    }
    let reason = response
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no error details".to_string());
    Err(ConnectorError::Rejected(reason))
}

/// Extracts the watermark from a `datastore_search` response, falling back
/// to the bootstrap instant when the resource is empty.
pub fn watermark_from_response(
    response: ActionResponse<SearchResult>,
    window: &Window,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ConnectorError> {
    ensure_success(&response)?;

    let records = response
        .result
        .ok_or_else(|| ConnectorError::Rejected("search response without result".to_string()))?
        .records;

    let Some(newest) = records.first() else {
        let bootstrap = window.bootstrap_watermark(now);
        info!(
            interval_minutes = window.interval().num_minutes(),
            bootstrap = %bootstrap,
            "no record found in CKAN, bootstrapping"
        );
        return Ok(bootstrap);
    };

    parse_timestamp(&newest.end_observation).map_err(|source| ConnectorError::Timestamp {
        value: newest.end_observation.clone(),
        source,
    })
}

#[async_trait]
impl<C: HttpClient> WatermarkSource for CkanClient<C> {
    #[tracing::instrument(skip(self), fields(component = "persistor client"))]
    async fn last_update(&self) -> Result<DateTime<Utc>, ConnectorError> {
        let req = self.search_request()?;

        let response: ActionResponse<SearchResult> = fetch_json(&self.http, req)
            .await
            .inspect_err(|e| error!(error = %e, "can't read data"))?;

        let last = watermark_from_response(response, &self.window, Utc::now())
            .inspect_err(|e| error!(error = %e, "can't read last update"))?;

        info!(last_date = %last, "updating from last date");
        Ok(last)
    }
}

#[async_trait]
impl<C: HttpClient> RecordSink for CkanClient<C> {
    #[tracing::instrument(skip(self, records), fields(component = "persistor client", records = records.len()))]
    async fn write_data(&self, records: &[GateCount]) -> Result<(), ConnectorError> {
        let req = self.upsert_request(records)?;

        let response: ActionResponse<serde_json::Value> = fetch_json(&self.http, req)
            .await
            .inspect_err(|e| error!(error = %e, "can't write data"))?;

        ensure_success(&response).inspect_err(|e| error!(error = %e, "CKAN rejected write"))
    }
}
