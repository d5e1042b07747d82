use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::model::TunnelRecord;
use crate::registry::{RegistryClient, RegistryError};

use super::deadline::Deadline;

/// Record fetches kept in flight during one pass.
pub const FETCH_CONCURRENCY: usize = 8;

const POLL_MIN_DELAY: Duration = Duration::from_millis(250);
const POLL_MAX_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub enum MatchOutcome {
    Found(TunnelRecord),
    /// The deadline or the cancellation token fired before anything matched.
    Exhausted,
}

/// Every tunnel record on the account. Records deleted between the listing
/// and the fetch are skipped.
pub async fn fetch_all(
    client: &RegistryClient,
    cancel: &CancellationToken,
) -> Result<Vec<TunnelRecord>, RegistryError> {
    let ids = client.list_tunnel_ids(cancel).await?;

    let mut fetches = stream::iter(ids)
        .map(move |id| async move {
            let result = client.get_tunnel(&id, cancel).await;
            (id, result)
        })
        .buffer_unordered(FETCH_CONCURRENCY);

    let mut records = Vec::new();
    while let Some((id, result)) = fetches.next().await {
        match result {
            Ok(record) => records.push(record),
            Err(e) if e.is_not_found() => {
                debug!(tunnel = %id, "tunnel disappeared before its record was fetched");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}

/// One pass over the account's tunnels.
pub async fn find_match<P>(
    client: &RegistryClient,
    cancel: &CancellationToken,
    predicate: P,
) -> Result<Option<TunnelRecord>, RegistryError>
where
    P: Fn(&TunnelRecord) -> bool,
{
    let records = fetch_all(client, cancel).await?;
    Ok(records.into_iter().find(|record| predicate(record)))
}

#[derive(Debug)]
enum PollError {
    NoMatch,
    Registry(RegistryError),
}

impl PollError {
    fn is_retryable(&self) -> bool {
        match self {
            PollError::NoMatch => true,
            PollError::Registry(e) => e.is_transient(),
        }
    }
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::NoMatch => f.write_str("no matching tunnel yet"),
            PollError::Registry(e) => write!(f, "{e}"),
        }
    }
}

/// Poll until a record satisfies `predicate` or `deadline` fires.
///
/// Passes are spaced by exponential back-off. Transient registry errors are
/// retried on the same cadence; anything else is returned immediately.
pub async fn wait_for_match<P>(
    client: &RegistryClient,
    deadline: &Deadline,
    predicate: P,
) -> Result<MatchOutcome, RegistryError>
where
    P: Fn(&TunnelRecord) -> bool,
{
    let cancel = deadline.token();
    let predicate = &predicate;

    let poll = (move || async move {
        match find_match(client, cancel, predicate).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(PollError::NoMatch),
            Err(e) => Err(PollError::Registry(e)),
        }
    })
    .retry(
        ExponentialBuilder::default()
            .with_min_delay(POLL_MIN_DELAY)
            .with_max_delay(POLL_MAX_DELAY)
            .without_max_times(),
    )
    .when(PollError::is_retryable)
    .notify(|err: &PollError, delay: Duration| {
        debug!(reason = %err, ?delay, "polling control plane again");
    });

    tokio::select! {
        biased;
        _ = deadline.expired() => Ok(MatchOutcome::Exhausted),
        result = poll => match result {
            Ok(record) => Ok(MatchOutcome::Found(record)),
            Err(PollError::Registry(e)) => Err(e),
            Err(PollError::NoMatch) => Ok(MatchOutcome::Exhausted),
        },
    }
}

/// Tunnels whose `sc` reported `hostname` as its host.
pub fn on_host(hostname: &str) -> impl Fn(&TunnelRecord) -> bool + '_ {
    move |record| record.hostname() == Some(hostname)
}

/// Tunnels carrying `identifier` that the control plane reports as running.
pub fn running_with_identifier(identifier: &str) -> impl Fn(&TunnelRecord) -> bool + '_ {
    move |record| record.is_running() && record.tunnel_identifier.as_deref() == Some(identifier)
}
