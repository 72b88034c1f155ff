//! Background garbage collection for rate-limiter buckets: every 300s,
//! drop any identity's bucket whose newest timestamp has aged out of
//! the active window.

mod private
{
  use gateway_auth::RateLimiter;
  use std::sync::Arc;
  use std::time::Duration;

  const GC_INTERVAL : Duration = Duration::from_secs( 300 );

  /// Spawn the background GC task; it runs until the process exits,
  /// there is nothing to shut down explicitly since it only ever reads
  /// and prunes shared state that outlives the gateway listener anyway.
  pub fn spawn( limiter : Arc< RateLimiter > )
  {
    tokio::spawn( async move
    {
      let mut interval = tokio::time::interval( GC_INTERVAL );
      interval.tick().await; // first tick fires immediately; skip it
      loop
      {
        interval.tick().await;
        limiter.gc();
      }
    } );
  }
}

pub use private::spawn;
