use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CatalogSettings;

use super::model::{CatalogTrack, Query, SearchResponse, playable};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid catalog url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog answered with status {0}")]
    Status(u16),
    #[error("malformed catalog reply: {0}")]
    Decode(String),
}

/// Blocking HTTP client for the search and lookup endpoints.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: reqwest::blocking::Client,
    settings: CatalogSettings,
}

impl Gateway {
    pub fn new(settings: CatalogSettings) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    fn build_url(base: &str, params: &[(&str, String)]) -> Result<Url, FetchError> {
        Url::parse_with_params(base, params).map_err(|e| FetchError::Url {
            url: base.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn search_url(&self, term: &str) -> Result<Url, FetchError> {
        let s = &self.settings;
        let mut params = vec![
            ("term", term.trim().to_string()),
            ("media", s.media.clone()),
            ("entity", s.entity.clone()),
            ("limit", s.limit.to_string()),
        ];
        if let Some(country) = &s.country {
            params.push(("country", country.clone()));
        }
        Self::build_url(&s.search_url, &params)
    }

    pub fn lookup_url(&self, collection_id: i64) -> Result<Url, FetchError> {
        let s = &self.settings;
        let mut params = vec![
            ("id", collection_id.to_string()),
            ("entity", s.entity.clone()),
        ];
        if let Some(country) = &s.country {
            params.push(("country", country.clone()));
        }
        Self::build_url(&s.lookup_url, &params)
    }

    pub fn url_for(&self, query: &Query) -> Result<Url, FetchError> {
        match query {
            Query::Search(term) => self.search_url(term),
            Query::Album(id) => self.lookup_url(*id),
        }
    }

    /// GET `url` and decode the reply. Anything but `200` is an error.
    pub fn try_request(&self, url: Url) -> Result<SearchResponse, FetchError> {
        debug!(%url, "catalog request");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }
        response
            .json::<SearchResponse>()
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GET `url`, degrading every failure to the empty response.
    pub fn request_data(&self, url: Url) -> SearchResponse {
        self.try_request(url).unwrap_or_else(|e| {
            warn!(error = %e, "catalog request failed");
            SearchResponse::default()
        })
    }

    /// Run `query` and keep the playable rows.
    ///
    /// `None` means the request failed, as opposed to an empty match.
    pub fn fetch(&self, query: &Query) -> Option<Vec<CatalogTrack>> {
        let response = match self.url_for(query) {
            Ok(url) => self.request_data(url),
            Err(e) => {
                warn!(query = %query.describe(), error = %e, "catalog url rejected");
                SearchResponse::default()
            }
        };
        let Some(results) = response.results else {
            info!(query = %query.describe(), "catalog request degraded to empty");
            return None;
        };
        let tracks = playable(results);
        info!(
            query = %query.describe(),
            reported = response.result_count,
            playable = tracks.len(),
            "catalog results"
        );
        Some(tracks)
    }
}

struct Request {
    serial: u64,
    query: Query,
}

/// Answer to a submitted query.
#[derive(Debug)]
pub struct Reply {
    pub serial: u64,
    pub query: Query,
    /// `None` when the request failed.
    pub result: Option<Vec<CatalogTrack>>,
}

/// Runs catalog requests off the UI thread.
///
/// Only the reply to the most recent submission is handed back; earlier
/// replies still in flight are discarded when they arrive.
pub struct CatalogWorker {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    serial: u64,
}

impl CatalogWorker {
    pub fn spawn<F>(mut fetch: F) -> io::Result<Self>
    where
        F: FnMut(&Query) -> Option<Vec<CatalogTrack>> + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        thread::Builder::new()
            .name("riffle-catalog".into())
            .spawn(move || {
                while let Ok(Request { serial, query }) = req_rx.recv() {
                    let result = fetch(&query);
                    if reply_tx
                        .send(Reply {
                            serial,
                            query,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            })?;

        Ok(Self {
            requests: req_tx,
            replies: reply_rx,
            serial: 0,
        })
    }

    /// Queue `query`, superseding anything submitted before.
    pub fn submit(&mut self, query: Query) -> u64 {
        self.serial += 1;
        let serial = self.serial;
        if self.requests.send(Request { serial, query }).is_err() {
            warn!("catalog worker is gone");
        }
        serial
    }

    /// The reply to the latest submission, if it has arrived.
    pub fn poll(&mut self) -> Option<Reply> {
        let mut latest = None;
        while let Ok(reply) = self.replies.try_recv() {
            if reply.serial == self.serial {
                latest = Some(reply);
            } else {
                debug!(serial = reply.serial, "stale catalog reply dropped");
            }
        }
        latest
    }
}
