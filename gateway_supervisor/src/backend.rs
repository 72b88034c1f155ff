//! Backend subprocess lifecycle: launch, verify the listen address is
//! actually loopback-only, then poll for readiness.

mod private
{
  use crate::error::{ Result, SupervisorError };
  use core::time::Duration;
  use secrecy::{ ExposeSecret, SecretString };
  use std::path::Path;
  use tokio::process::{ Child, Command };

  /// How long after launch the supervisor waits before checking bind
  /// addresses.
  const LOOPBACK_CHECK_DELAY : Duration = Duration::from_millis( 500 );
  /// Interval between readiness poll attempts.
  const READINESS_POLL_INTERVAL : Duration = Duration::from_millis( 250 );

  /// A launched backend child process.
  #[ derive( Debug ) ]
  pub struct BackendProcess
  {
    child : Child,
  }

  impl BackendProcess
  {
    /// Launch the inference backend, injecting the credential and port
    /// via environment variables (the most portable mechanism across
    /// backend implementations, since argument surfaces vary).
    ///
    /// # Errors
    /// Returns [`SupervisorError::BackendLaunch`] if the process cannot
    /// be spawned.
    pub fn launch
    (
      program : &str,
      args : &[ String ],
      host : &str,
      port : u16,
      credential : &SecretString,
      log_dir : &Path,
    ) -> Result< Self >
    {
      let mut command = Command::new( program );
      command
        .args( args )
        .env( "BACKEND_HOST", host )
        .env( "BACKEND_PORT", port.to_string() )
        .env( "BACKEND_CREDENTIAL", credential.expose_secret() )
        .env( "BACKEND_LOG_DIR", log_dir )
        .kill_on_drop( true );

      let child = command.spawn().map_err( SupervisorError::BackendLaunch )?;
      Ok( Self { child } )
    }

    /// Wait `LOOPBACK_CHECK_DELAY`, then verify the backend is bound only
    /// to a loopback address by scanning the kernel's listening-socket
    /// table. A non-loopback bind is treated as a security violation and
    /// aborts startup.
    ///
    /// # Errors
    /// Returns [`SupervisorError::BackendNotLoopback`] if any listener
    /// for `port` is bound to a non-loopback address. Platforms without
    /// `/proc/net/tcp` (non-Linux) skip the check and return `Ok`.
    pub async fn verify_loopback_bound( &self, port : u16 ) -> Result< () >
    {
      tokio::time::sleep( LOOPBACK_CHECK_DELAY ).await;
      verify_loopback_bound_impl( port ).await
    }

    /// Poll the backend's own health surface until it answers or the
    /// timeout elapses. Logs but does not propagate a timeout as fatal;
    /// the gateway's `/health` will report backend state independently.
    pub async fn wait_for_readiness( &self, host : &str, port : u16, timeout : Duration )
    {
      let deadline = tokio::time::Instant::now() + timeout;
      loop
      {
        if tokio::net::TcpStream::connect( ( host, port ) ).await.is_ok()
        {
          tracing::info!( %host, port, "backend accepting connections" );
          return;
        }
        if tokio::time::Instant::now() >= deadline
        {
          tracing::warn!( %host, port, ?timeout, "backend did not become ready in time, continuing startup" );
          return;
        }
        tokio::time::sleep( READINESS_POLL_INTERVAL ).await;
      }
    }

    /// Send `TERM`, wait up to `grace`, then forcibly kill if still
    /// running.
    pub async fn terminate( &mut self, grace : Duration )
    {
      #[ cfg( unix ) ]
      {
        if let Some( pid ) = self.child.id()
        {
          send_signal( pid, libc_sigterm() );
        }
      }

      let _ = tokio::time::timeout( grace, self.child.wait() ).await;
      let _ = self.child.start_kill();
      let _ = self.child.wait().await;
    }

    /// Wait for the child to exit on its own (used by the supervisor's
    /// main select loop to detect an unexpected crash).
    pub async fn wait( &mut self ) -> std::io::Result< std::process::ExitStatus >
    {
      self.child.wait().await
    }
  }

  #[ cfg( unix ) ]
  fn libc_sigterm() -> i32
  {
    15
  }

  #[ cfg( unix ) ]
  fn send_signal( pid : u32, signal : i32 )
  {
    // SAFETY-free path: shell out to `kill` rather than bind libc
    // directly, keeping this crate free of an `unsafe` dependency, in
    // keeping with the workspace's `unsafe-code = "deny"` lint.
    let _ = std::process::Command::new( "kill" )
      .arg( format!( "-{signal}" ) )
      .arg( pid.to_string() )
      .status();
  }

  #[ cfg( target_os = "linux" ) ]
  async fn verify_loopback_bound_impl( port : u16 ) -> Result< () >
  {
    for table in [ "/proc/net/tcp", "/proc/net/tcp6" ]
    {
      let Ok( contents ) = tokio::fs::read_to_string( table ).await else { continue };
      for line in contents.lines().skip( 1 )
      {
        if let Some( ( addr, bound_port ) ) = parse_local_address( line )
        {
          if bound_port == port && !is_loopback_hex( &addr )
          {
            return Err( SupervisorError::BackendNotLoopback( addr ) );
          }
        }
      }
    }
    Ok( () )
  }

  #[ cfg( target_os = "linux" ) ]
  fn parse_local_address( line : &str ) -> Option< ( String, u16 ) >
  {
    let field = line.split_whitespace().nth( 1 )?;
    let ( ip_hex, port_hex ) = field.split_once( ':' )?;
    let port = u16::from_str_radix( port_hex, 16 ).ok()?;
    Some( ( ip_hex.to_string(), port ) )
  }

  /// `/proc/net/tcp` encodes the local address as little-endian hex.
  /// IPv4 loopback `127.0.0.1` is `0100007F`; IPv6 `::1` is all zeros
  /// except a trailing `01000000`.
  #[ cfg( target_os = "linux" ) ]
  fn is_loopback_hex( ip_hex : &str ) -> bool
  {
    ip_hex.eq_ignore_ascii_case( "0100007F" ) || ip_hex.eq_ignore_ascii_case( "00000000000000000000000001000000" )
  }

  #[ cfg( not( target_os = "linux" ) ) ]
  async fn verify_loopback_bound_impl( _port : u16 ) -> Result< () >
  {
    Ok( () )
  }

  #[ cfg( all( test, target_os = "linux" ) ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn loopback_hex_is_recognized()
    {
      assert!( is_loopback_hex( "0100007F" ) );
      assert!( !is_loopback_hex( "00000000" ) );
    }

    #[ test ]
    fn parses_local_address_field()
    {
      let line = "   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 12345 1 0000000000000000 100 0 0 10 0";
      let ( addr, port ) = parse_local_address( line ).expect( "should parse" );
      assert_eq!( addr, "0100007F" );
      assert_eq!( port, 0x1F90 );
    }
  }
}

pub use private::BackendProcess;
