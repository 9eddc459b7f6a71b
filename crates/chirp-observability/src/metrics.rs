//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for Chirp:
//! - Account activity (signups, logins by outcome, logouts)
//! - Tweet activity (created, deleted, rejected deletes by reason)
//! - HTTP request counts and latency by route and status

use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

/// Login result label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Wrong password or unknown username
    Rejected,
}

impl LoginOutcome {
    fn as_label(self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::Rejected => "rejected",
        }
    }
}

/// Why a delete request did not remove a tweet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRejection {
    NotFound,
    NotOwner,
}

impl DeleteRejection {
    fn as_label(self) -> &'static str {
        match self {
            DeleteRejection::NotFound => "not_found",
            DeleteRejection::NotOwner => "not_owner",
        }
    }
}

/// Metrics collector for Chirp
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Accounts
    pub signups_total: Counter,
    pub logins_total: CounterVec,
    pub logouts_total: Counter,

    // Tweets
    pub tweets_created_total: Counter,
    pub tweets_deleted_total: Counter,
    pub tweet_deletes_rejected_total: CounterVec,

    // HTTP
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let signups_total = Counter::with_opts(Opts::new(
            "chirp_signups_total",
            "Total number of accounts created",
        ))?;

        let logins_total = CounterVec::new(
            Opts::new("chirp_logins_total", "Total number of login attempts"),
            &["outcome"],
        )?;

        let logouts_total =
            Counter::with_opts(Opts::new("chirp_logouts_total", "Total number of logouts"))?;

        let tweets_created_total = Counter::with_opts(Opts::new(
            "chirp_tweets_created_total",
            "Total number of tweets created",
        ))?;

        let tweets_deleted_total = Counter::with_opts(Opts::new(
            "chirp_tweets_deleted_total",
            "Total number of tweets deleted",
        ))?;

        let tweet_deletes_rejected_total = CounterVec::new(
            Opts::new(
                "chirp_tweet_deletes_rejected_total",
                "Total number of delete requests that removed nothing",
            ),
            &["reason"],
        )?;

        let http_requests_total = CounterVec::new(
            Opts::new("chirp_http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "chirp_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "route", "status"],
        )?;

        registry.register(Box::new(signups_total.clone()))?;
        registry.register(Box::new(logins_total.clone()))?;
        registry.register(Box::new(logouts_total.clone()))?;
        registry.register(Box::new(tweets_created_total.clone()))?;
        registry.register(Box::new(tweets_deleted_total.clone()))?;
        registry.register(Box::new(tweet_deletes_rejected_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            signups_total,
            logins_total,
            logouts_total,
            tweets_created_total,
            tweets_deleted_total,
            tweet_deletes_rejected_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_signup(&self) {
        self.signups_total.inc();
    }

    pub fn record_login(&self, outcome: LoginOutcome) {
        self.logins_total
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    pub fn record_logout(&self) {
        self.logouts_total.inc();
    }

    pub fn record_tweet_created(&self) {
        self.tweets_created_total.inc();
    }

    pub fn record_tweet_deleted(&self) {
        self.tweets_deleted_total.inc();
    }

    pub fn record_delete_rejected(&self, reason: DeleteRejection) {
        self.tweet_deletes_rejected_total
            .with_label_values(&[reason.as_label()])
            .inc();
    }

    /// Record a finished HTTP request.
    ///
    /// `route` should be the matched route template (e.g. `/tweets/{id}/`),
    /// not the raw path, to keep label cardinality bounded.
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, route, status.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, route, status.as_str()])
            .observe(duration_secs);
    }
}
