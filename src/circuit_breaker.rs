use failsafe::{backoff, failure_policy, Config};
use std::time::Duration;

/// Creates the circuit breaker guarding calls to the geocoding provider.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures trips the breaker OPEN.
/// - **Backoff**: exponential from 10s to 60s before a trial call is let through.
///
/// While OPEN, address updates fail fast with a geocode error instead of
/// waiting on a provider that is known to be down.
///
/// # Example
///
/// ```rust
/// use crime_report_api::circuit_breaker::create_geocoder_circuit_breaker;
/// use failsafe::CircuitBreaker;
///
/// let breaker = create_geocoder_circuit_breaker();
/// assert!(breaker.is_call_permitted());
/// ```
pub fn create_geocoder_circuit_breaker() -> impl failsafe::CircuitBreaker + Send + Sync + 'static
{
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
