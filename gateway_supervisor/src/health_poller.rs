//! Background re-poll of backend reachability: every `HealthPollTimeout`,
//! attempt a loopback connect and publish the result to [`BackendStatus`]
//! so `/health` stays current without probing the backend synchronously
//! on every request.

mod private
{
  use gateway_proxy::BackendStatus;
  use std::sync::Arc;
  use std::time::Duration;

  /// Spawn the background poller; it runs until the process exits, same
  /// as the rate-limiter GC task.
  pub fn spawn( host : String, port : u16, interval : Duration, status : Arc< BackendStatus > )
  {
    tokio::spawn( async move
    {
      let mut ticker = tokio::time::interval( interval );
      ticker.tick().await; // first tick fires immediately; skip it
      loop
      {
        ticker.tick().await;
        let healthy = tokio::net::TcpStream::connect( ( host.as_str(), port ) ).await.is_ok();
        status.set( healthy );
      }
    } );
  }
}

pub use private::spawn;
