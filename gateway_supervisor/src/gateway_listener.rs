//! The external gateway listener: accepts connections and spawns one
//! task per connection running [`gateway_proxy::handle_connection`].

mod private
{
  use gateway_proxy::GatewayState;
  use tokio::net::TcpListener;
  use tokio::sync::watch;
  use tokio::task::JoinSet;

  /// Bind the gateway's external listen port and serve connections until
  /// `shutdown` reports `true`. New connections stop being accepted
  /// immediately on shutdown; every per-connection task is tracked in a
  /// [`JoinSet`] and this function does not return until all of them
  /// finish, so the caller's own `ShutdownDrainDeadline` timeout (applied
  /// to this whole future) is what actually bounds the drain.
    ///
    /// # Errors
    /// Returns an I/O error if the listener fails to bind.
  pub async fn run( host : &str, port : u16, state : GatewayState, mut shutdown : watch::Receiver< bool > ) -> std::io::Result< () >
  {
    let listener = TcpListener::bind( ( host, port ) ).await?;
    tracing::info!( %host, port, "gateway listening" );

    let mut connections = JoinSet::new();

    loop
    {
      tokio::select!
      {
        accepted = listener.accept() =>
        {
          let ( stream, _peer ) = accepted?;
          let state = state.clone();
          connections.spawn( async move { gateway_proxy::handle_connection( stream, state ).await; } );
        }
        _ = shutdown.changed() =>
        {
          if *shutdown.borrow()
          {
            tracing::info!( in_flight = connections.len(), "gateway listener shutting down, draining in-flight connections" );
            while connections.join_next().await.is_some() {}
            return Ok( () );
          }
        }
      }
    }
  }
}

pub use private::run;
