use std::time::Duration;

use log::{info, warn};

use crate::{config::NetworkConfig, error::BringupError, peripherals::NetworkLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

impl From<&NetworkConfig> for RetryPolicy {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            attempts: network.connect_attempts.max(1),
            delay: Duration::from_millis(network.retry_delay_ms),
        }
    }
}

/// Polls `link` until it reports a connection, sleeping between checks.
/// Returns the local address once connected.
pub fn wait_for_link<N, S>(
    link: &N,
    policy: RetryPolicy,
    mut sleep: S,
) -> Result<String, BringupError>
where
    N: NetworkLink + ?Sized,
    S: FnMut(Duration),
{
    for attempt in 1..=policy.attempts {
        if link.is_connected() {
            let address = link.local_address().ok_or(BringupError::NoAddress)?;
            info!("network up on check {attempt}/{}: {address}", policy.attempts);
            return Ok(address);
        }

        if attempt < policy.attempts {
            sleep(policy.delay);
        }
    }

    warn!("network still down after {} check(s)", policy.attempts);
    Err(BringupError::NotConnected {
        attempts: policy.attempts,
    })
}

/// Station first. The access point is offered only after the station has an
/// address, and never when bring-up fails.
pub fn bring_up<N, S>(link: &mut N, policy: RetryPolicy, sleep: S) -> Result<String, BringupError>
where
    N: NetworkLink + ?Sized,
    S: FnMut(Duration),
{
    let address = wait_for_link(&*link, policy, sleep)?;

    match link.start_access_point() {
        Ok(Some(ap_address)) => info!("access point up at {ap_address}"),
        Ok(None) => {}
        Err(err) => warn!("access point not started: {err}"),
    }
    Ok(address)
}
