//! The top-level orchestration: validate configuration, generate a
//! credential, launch the backend, wait for readiness, launch the
//! health pinger and gateway, then select on signals and child exits
//! until an orderly teardown.

mod private
{
  use crate::
  {
    backend::BackendProcess,
    boot_log::BootTranscript,
    credential::BackendCredential,
    error::{ Result, SupervisorError },
    gateway_listener,
    rate_limit_gc,
    signals::{ self, SupervisorSignal },
  };
  use gateway_auth::Authenticator;
  use gateway_core::{ Config, MetricsRegistry };
  use gateway_proxy::{ BackendStatus, ConcurrencyGate, GatewayState };
  use std::sync::Arc;
  use tokio::sync::watch;

  /// Run the supervisor to completion, returning the process exit code
  /// (0 normal, 1 general failure, 2 configuration error).
  pub async fn run() -> i32
  {
    let config = match Config::from_env()
    {
      Ok( config ) => config,
      Err( err ) =>
      {
        eprintln!( "configuration error: {err}" );
        return 2;
      }
    };

    gateway_core::logging::init( config.log_format );
    for warning in &config.warnings
    {
      tracing::warn!( "{warning}" );
    }

    match run_with_config( config ).await
    {
      Ok( code ) => code,
      Err( err ) =>
      {
        tracing::error!( error = %err, "supervisor exiting on error" );
        1
      }
    }
  }

  async fn run_with_config( config : Config ) -> Result< i32 >
  {
    let config = Arc::new( config );
    let timestamp = boot_timestamp();
    let mut boot_log = BootTranscript::open( &config.boot_log_dir(), &timestamp ).await?;
    boot_log.line( "supervisor starting" ).await;

    if config.debug_hold
    {
      boot_log.line( "DEBUG_HOLD set: logging configuration and sleeping" ).await;
      tracing::info!( ?config, "debug hold: configuration validated, sleeping indefinitely" );
      tokio::time::sleep( core::time::Duration::from_secs( u64::MAX / 2 ) ).await;
      return Ok( 0 );
    }

    let credential = BackendCredential::generate().await?;
    boot_log.line( "backend credential generated" ).await;

    let mut backend = match &config.backend_command
    {
      Some( command ) =>
      {
        let ( program, args ) = command.split_first().expect( "non-empty BACKEND_COMMAND" );
        let process = BackendProcess::launch(
          program,
          args,
          &config.backend_host,
          config.backend_port,
          &credential.secret(),
          &config.worker_log_dir(),
        )?;
        boot_log.line( "backend process launched" ).await;

        if let Err( err ) = process.verify_loopback_bound( config.backend_port ).await
        {
          tracing::error!( error = %err, "backend failed loopback verification, tearing down" );
          credential.shred().await;
          return Err( err );
        }
        boot_log.line( "backend verified loopback-bound" ).await;

        process.wait_for_readiness( &config.backend_host, config.backend_port, config.health_poll_timeout ).await;
        boot_log.line( "backend readiness wait complete" ).await;
        Some( process )
      }
      None =>
      {
        tracing::warn!( "BACKEND_COMMAND not set, assuming backend is already running externally" );
        None
      }
    };

    let access_log = gateway_core::access_log::spawn(
      &config.access_log_path(),
      matches!( config.log_format, gateway_core::LogFormat::Json ),
    ).await?;

    let authenticator = Arc::new( Authenticator::new( config.auth_keys_file.clone(), config.global_rate_limit_per_minute ) );
    rate_limit_gc::spawn( authenticator.rate_limiter() );

    let backend_status = BackendStatus::new( backend.is_some() );
    if backend.is_some()
    {
      crate::health_poller::spawn(
        config.backend_host.clone(), config.backend_port, config.health_poll_timeout, backend_status.clone(),
      );
    }
    let metrics = Arc::new( MetricsRegistry::new() );
    let gate = ConcurrencyGate::new( config.max_concurrent, config.max_queue_size, metrics.clone() );

    let gateway_state = GatewayState
    {
      config : Arc::clone( &config ),
      authenticator : Arc::clone( &authenticator ),
      metrics,
      access_log,
      gate,
      credential : Arc::new( credential.secret() ),
      backend_status,
    };

    let ( gateway_shutdown_tx, gateway_shutdown_rx ) = watch::channel( false );
    let ( pinger_shutdown_tx, pinger_shutdown_rx ) = watch::channel( false );

    let gateway_task = tokio::spawn( gateway_listener::run(
      "0.0.0.0", config.gateway_port, gateway_state, gateway_shutdown_rx,
    ) );
    boot_log.line( "gateway listener started" ).await;

    let pinger_task = tokio::spawn( gateway_proxy::pinger::run(
      "0.0.0.0", config.health_port, pinger_shutdown_rx,
    ) );
    boot_log.line( "health pinger started" ).await;

    let mut signal_rx = signals::install()?;

    let exit_code = loop
    {
      tokio::select!
      {
        signal = signal_rx.recv() =>
        {
          match signal
          {
            Some( SupervisorSignal::Shutdown ) | None =>
            {
              tracing::info!( "shutdown signal received, draining" );
              break graceful_shutdown(
                &config, &mut backend, &credential,
                &gateway_shutdown_tx, &pinger_shutdown_tx,
                gateway_task, pinger_task, 0,
              ).await;
            }
            Some( SupervisorSignal::Reload ) =>
            {
              tracing::info!( "reload signal received" );
              match authenticator.reload()
              {
                Ok( n ) => tracing::info!( keys_loaded = n, "key store reloaded" ),
                Err( reason ) => tracing::warn!( reason, "key store reload rejected, prior store retained" ),
              }
            }
          }
        }
        backend_status_change = watch_backend( backend.as_mut(), &config ) =>
        {
          if let Some( exited ) = backend_status_change
          {
            let err = SupervisorError::ChildExited { name : "backend", status : exited.to_string() };
            tracing::error!( error = %err, "backend exited unexpectedly, tearing down" );
            break graceful_shutdown(
              &config, &mut backend, &credential,
              &gateway_shutdown_tx, &pinger_shutdown_tx,
              gateway_task, pinger_task, exited.exit_code(),
            ).await;
          }
        }
      }
    };

    boot_log.line( &format!( "supervisor exiting with code {exit_code}" ) ).await;
    Ok( exit_code )
  }

  /// How the backend process ended, carrying enough to derive a process
  /// exit code in addition to a human-readable status.
  enum BackendExit
  {
    Status( std::process::ExitStatus ),
    Error( std::io::Error ),
  }

  impl core::fmt::Display for BackendExit
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      match self
      {
        Self::Status( status ) => write!( f, "{status}" ),
        Self::Error( err ) => write!( f, "{err}" ),
      }
    }
  }

  impl BackendExit
  {
    /// The process exit code to propagate: the child's own code when the
    /// platform exposes one, `1` otherwise (signal death or a `wait`
    /// I/O error).
    fn exit_code( &self ) -> i32
    {
      match self
      {
        Self::Status( status ) => status.code().unwrap_or( 1 ),
        Self::Error( _ ) => 1,
      }
    }
  }

  /// Await the backend's exit, or pend forever if there is none to
  /// watch (so the `select!` arm never wins spuriously).
  async fn watch_backend( backend : Option< &mut BackendProcess >, _config : &Config ) -> Option< BackendExit >
  {
    match backend
    {
      Some( process ) => match process.wait().await
      {
        Ok( status ) => Some( BackendExit::Status( status ) ),
        Err( err ) => Some( BackendExit::Error( err ) ),
      },
      None => core::future::pending().await,
    }
  }

  async fn graceful_shutdown
  (
    config : &Config,
    backend : &mut Option< BackendProcess >,
    credential : &BackendCredential,
    gateway_shutdown_tx : &watch::Sender< bool >,
    pinger_shutdown_tx : &watch::Sender< bool >,
    gateway_task : tokio::task::JoinHandle< std::io::Result< () > >,
    pinger_task : tokio::task::JoinHandle< std::io::Result< () > >,
    exit_code : i32,
  ) -> i32
  {
    let _ = gateway_shutdown_tx.send( true );
    let _ = pinger_shutdown_tx.send( true );

    let _ = tokio::time::timeout( config.shutdown_drain_deadline, gateway_task ).await;
    let _ = tokio::time::timeout( core::time::Duration::from_secs( 5 ), pinger_task ).await;

    if let Some( process ) = backend
    {
      process.terminate( core::time::Duration::from_secs( 30 ) ).await;
    }

    credential.shred().await;
    exit_code
  }

  fn boot_timestamp() -> String
  {
    chrono::Utc::now().format( "%Y%m%d_%H%M%S" ).to_string()
  }
}

pub use private::run;
