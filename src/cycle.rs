//! The fetch, decode, report loop.

use std::num::NonZeroUsize;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::decoder::FeedDecoder;
use crate::fetch::{self, HttpClient};
use crate::filter::{RouteFilter, VehicleMatch};
use crate::network::{LinkStatus, Network};
use crate::output::Reporter;
use crate::stats::FeedTally;
use crate::stream::{ByteStream, ChunkSource};

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleReport {
    /// The feed decoded completely. `matches` is only meaningful here.
    Matched {
        route_id: String,
        matches: usize,
        tally: FeedTally,
        feed_timestamp: Option<u64>,
    },
    /// No network link; nothing was fetched.
    Disconnected,
    /// `status` is `None` when the request failed before any HTTP status.
    FetchFailed {
        #[serde(rename = "status_code")]
        status: Option<u16>,
        reason: String,
    },
    DecodeFailed { reason: String },
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Polls one feed for one route, forever or for a fixed number of cycles.
pub struct Tracker<N, C, R> {
    config: Config,
    network: N,
    client: C,
    reporter: R,
    decoder: FeedDecoder,
}

impl<N: Network, C: HttpClient, R: Reporter> Tracker<N, C, R> {
    pub fn new(config: Config, network: N, client: C, reporter: R) -> Self {
        let decoder = FeedDecoder::new(config.max_message_len);
        Self {
            config,
            network,
            client,
            reporter,
            decoder,
        }
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Runs cycles back to back with the poll interval between them. With a
    /// limit, returns after that many cycles; otherwise never returns.
    pub async fn run(&mut self, cycles: Option<NonZeroUsize>) {
        let mut completed = 0;

        loop {
            self.run_cycle().await;
            completed += 1;

            if cycles.is_some_and(|limit| completed >= limit.get()) {
                break;
            }

            info!(
                interval_ms = self.config.poll_interval.as_millis() as u64,
                "Waiting before next fetch"
            );
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Performs and reports one cycle. Failures are reported, never returned.
    #[tracing::instrument(skip(self), fields(route_id = %self.config.route_id))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let report = match self.network.status().await {
            LinkStatus::Associated => self.fetch_and_decode().await,
            LinkStatus::NotAssociated => CycleReport::Disconnected,
        };

        self.reporter.cycle(&report);
        report
    }

    async fn fetch_and_decode(&mut self) -> CycleReport {
        debug!(feed_url = %self.config.feed_url, "Requesting feed");

        let response = match fetch::get(&self.client, &self.config.request_url()).await {
            Ok(response) => response,
            Err(err) => {
                return CycleReport::FetchFailed {
                    status: None,
                    reason: format!("{err:#}"),
                };
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return CycleReport::FetchFailed {
                status: Some(status.as_u16()),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unrecognized status")
                    .to_string(),
            };
        }
        debug!(
            status = status.as_u16(),
            content_length = response.content_length(),
            "Streaming feed body"
        );

        let mut stream = ByteStream::new(response);
        let report = decode_stream(
            &self.decoder,
            &mut stream,
            &self.config.route_id,
            &mut self.reporter,
        )
        .await;

        drop(stream);
        debug!("Connection released");

        report
    }
}

/// Decodes one feed from `stream`, reporting each vehicle on `route_id` as
/// it is found. The returned report is not passed to `reporter`.
pub async fn decode_stream<S, R>(
    decoder: &FeedDecoder,
    stream: &mut ByteStream<S>,
    route_id: &str,
    reporter: &mut R,
) -> CycleReport
where
    S: ChunkSource,
    R: Reporter + ?Sized,
{
    let mut filter = RouteFilter::new(route_id, |found: VehicleMatch| reporter.vehicle(&found));

    match decoder.decode(stream, &mut filter).await {
        Ok(summary) => {
            debug!(
                entities = summary.entities,
                bytes = summary.bytes_read,
                "Feed decoded"
            );
            CycleReport::Matched {
                route_id: route_id.to_string(),
                matches: filter.matched(),
                tally: *filter.tally(),
                feed_timestamp: summary.header.timestamp,
            }
        }
        Err(err) => CycleReport::DecodeFailed {
            reason: err.to_string(),
        },
    }
}
