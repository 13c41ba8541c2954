//! Per-client request limits
//!
//! One keyed token bucket per limited route. Clients are keyed by peer IP;
//! requests without connection info (e.g. in-process tests) share the
//! `None` bucket.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{DefaultKeyedRateLimiter, Quota};
use tracing::{debug, warn};

use crate::config::RateLimit;
use crate::error::{AppError, Result};

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please wait a moment and try again.";

pub type ClientLimiter = DefaultKeyedRateLimiter<Option<IpAddr>>;

/// How often idle client buckets are dropped.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Bucket holding `limit.requests` tokens, refilled evenly over `limit.period`.
pub fn build_limiter(limit: &RateLimit) -> Result<Arc<ClientLimiter>> {
    let burst = NonZeroU32::new(limit.requests)
        .ok_or_else(|| AppError::Config("rate limit must allow at least one request".into()))?;
    let quota = Quota::with_period(limit.period / limit.requests)
        .ok_or_else(|| AppError::Config(format!("rate limit {limit:?} is too fine-grained")))?
        .allow_burst(burst);
    Ok(Arc::new(ClientLimiter::keyed(quota)))
}

/// Forget clients whose bucket has fully refilled; returns how many remain.
pub fn prune_idle_clients(limiter: &ClientLimiter) -> usize {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}

/// Prune `limiters` every `every` until the runtime shuts down.
pub fn spawn_pruner(
    limiters: Vec<Arc<ClientLimiter>>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for limiter in &limiters {
                let remaining = prune_idle_clients(limiter);
                debug!("Rate limiter tracking {remaining} client(s)");
            }
        }
    })
}

fn client_key(req: &Request) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Middleware rejecting requests over the client's budget with 429.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<ClientLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);
    if limiter.check_key(&key).is_err() {
        warn!("Rate limit exceeded for {:?} on {}", key, req.uri().path());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": RATE_LIMITED_MESSAGE })),
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let limiter = build_limiter(&RateLimit {
            requests: 2,
            period: Duration::from_secs(60),
        })
        .unwrap();
        let me = Some(IpAddr::from([10, 0, 0, 1]));
        let other = Some(IpAddr::from([10, 0, 0, 2]));

        assert!(limiter.check_key(&me).is_ok());
        assert!(limiter.check_key(&me).is_ok());
        assert!(limiter.check_key(&me).is_err());
        assert!(limiter.check_key(&other).is_ok(), "buckets are per client");
        assert!(limiter.check_key(&None).is_ok());
    }

    #[test]
    fn test_prune_drops_refilled_clients() {
        let limiter = build_limiter(&RateLimit {
            requests: 1,
            period: Duration::from_millis(20),
        })
        .unwrap();

        for i in 0..100u8 {
            assert!(limiter.check_key(&Some(IpAddr::from([10, 0, 1, i]))).is_ok());
        }
        assert_eq!(limiter.len(), 100);
        assert_eq!(prune_idle_clients(&limiter), 100, "buckets still refilling");

        std::thread::sleep(Duration::from_millis(60));
        let recent = Some(IpAddr::from([10, 0, 0, 9]));
        assert!(limiter.check_key(&recent).is_ok());

        assert_eq!(prune_idle_clients(&limiter), 1);
        assert!(limiter.check_key(&recent).is_err(), "active client keeps its state");
    }

    #[tokio::test]
    async fn test_pruner_task_runs() {
        let limiter = build_limiter(&RateLimit {
            requests: 1,
            period: Duration::from_millis(10),
        })
        .unwrap();
        assert!(limiter.check_key(&Some(IpAddr::from([10, 0, 2, 1]))).is_ok());

        let handle = spawn_pruner(vec![limiter.clone()], Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert!(limiter.is_empty());
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let err = build_limiter(&RateLimit {
            requests: 5,
            period: Duration::ZERO,
        });
        assert!(matches!(err, Err(AppError::Config(_))));
    }
}
