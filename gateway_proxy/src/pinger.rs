//! The health pinger: an independent, stateless listener that answers
//! any `GET` with `200 OK` and an empty body. No backend
//! contact, no authentication, no CORS — it exists so a deadlock in the
//! gateway task doesn't take platform liveness checks down with it.

mod private
{
  use tokio::io::{ AsyncReadExt, AsyncWriteExt };
  use tokio::net::TcpListener;

  const RESPONSE : &[ u8 ] = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

  /// Bind and serve the health pinger until `shutdown` resolves.
    ///
    /// # Errors
    /// Returns an I/O error if the listener fails to bind.
  pub async fn run( host : &str, port : u16, mut shutdown : tokio::sync::watch::Receiver< bool > ) -> std::io::Result< () >
  {
    let listener = TcpListener::bind( ( host, port ) ).await?;
    tracing::info!( %host, port, "health pinger listening" );

    loop
    {
      tokio::select!
      {
        accepted = listener.accept() =>
        {
          let ( stream, _peer ) = accepted?;
          tokio::spawn( async move { let _ = serve_one( stream ).await; } );
        }
        _ = shutdown.changed() =>
        {
          if *shutdown.borrow()
          {
            tracing::info!( "health pinger shutting down" );
            return Ok( () );
          }
        }
      }
    }
  }

  async fn serve_one( mut stream : tokio::net::TcpStream ) -> std::io::Result< () >
  {
    // Drain whatever the client sent up to a small cap; we don't parse it,
    // we just need to not hang forever on a client that never writes.
    let mut discard = [ 0u8; 1024 ];
    let _ = tokio::time::timeout( core::time::Duration::from_secs( 5 ), stream.read( &mut discard ) ).await;
    stream.write_all( RESPONSE ).await?;
    stream.flush().await
  }
}

pub use private::run;
