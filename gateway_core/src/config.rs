//! Environment-driven configuration for the gateway workspace.
//!
//! This module is the single place that reads `std::env` so the rest of
//! the workspace stays testable (construct a [`Config`] by hand in
//! tests, never touch the environment again).

mod private
{
  use crate::error::{ GatewayError, Result };
  use core::time::Duration;
  use std::
  {
    env,
    path::PathBuf,
  };

  /// Data directory candidates probed, in order, when the operator-supplied
  /// value does not exist on disk. Mirrors the platform auto-detection
  /// described in the component design for the supervisor.
  const DATA_DIR_CANDIDATES : &[ &str ] = &[ "/runpod-volume", "/workspace", "/data" ];

  /// Log output format.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum LogFormat
  {
    /// Human-readable line-per-event text.
    Text,
    /// One JSON object per event.
    Json,
  }

  /// Fully validated, immutable process configuration.
  ///
  /// Constructed once at supervisor startup via [`Config::from_env`]; every
  /// other component receives an `Arc<Config>` or individual fields, never
  /// reads the environment itself.
  #[ derive( Debug, Clone ) ]
  pub struct Config
  {
    /// External gateway listen port.
    pub gateway_port : u16,
    /// Platform health listen port.
    pub health_port : u16,
    /// Backend loopback port.
    pub backend_port : u16,
    /// Backend host; must resolve to a loopback address.
    pub backend_host : String,

    /// Whether authentication is enforced on protected endpoints.
    pub auth_enabled : bool,
    /// Path to the API key file.
    pub auth_keys_file : PathBuf,
    /// Default per-identity requests-per-minute when a key has no override.
    pub global_rate_limit_per_minute : u32,
    /// Whether `/metrics` itself requires authentication.
    pub metrics_require_auth : bool,

    /// Concurrency gate seats.
    pub max_concurrent : usize,
    /// Concurrency gate queue bound; `0` means unbounded.
    pub max_queue_size : usize,

    /// Ingress body cap in bytes.
    pub max_request_body : usize,
    /// Ingress header count cap.
    pub max_headers : usize,
    /// Ingress single header line cap in bytes.
    pub max_header_line : usize,
    /// Ingress request line cap in bytes.
    pub max_request_line : usize,
    /// Egress (backend response) header block cap in bytes.
    pub max_response_header_total : usize,

    /// End-to-end proxy timeout, covering the whole backend interaction.
    pub request_timeout : Duration,
    /// Backend TCP connect timeout.
    pub backend_connect_timeout : Duration,
    /// Time allowed to read a full header block from the client.
    pub client_header_timeout : Duration,
    /// Timeout used when `/health` polls the backend.
    pub health_poll_timeout : Duration,
    /// Deadline for draining in-flight requests on graceful shutdown.
    pub shutdown_drain_deadline : Duration,

    /// CORS allow-list: `None` disables CORS entirely, `Some(vec![])` never
    /// occurs (an empty env var disables CORS, same as unset).
    pub cors_origins : Option< CorsOrigins >,

    /// Data directory, resolved via auto-detection if necessary.
    pub data_dir : PathBuf,
    /// Log output format.
    pub log_format : LogFormat,
    /// Suffix used for the backend's log subdirectory.
    pub worker_type_tag : String,
    /// When set, the supervisor logs config, sleeps, and exits.
    pub debug_hold : bool,

    /// A human reference to the model being served; required, any
    /// non-empty value is accepted (the backend interprets it).
    pub model_reference : String,

    /// Program and arguments used to launch the backend subprocess;
    /// space-separated. Not part of the distilled configuration table
    /// (the backend launch mechanism is named out of scope for the
    /// request-processing core), but the supervisor needs something to
    /// exec — `None` means "backend already running externally", useful
    /// in development.
    pub backend_command : Option< Vec< String > >,

    /// Non-fatal warnings accumulated while parsing (deprecated variable
    /// names, unrecognized variables sharing a known prefix). Surfaced by
    /// the supervisor's boot transcript.
    pub warnings : Vec< String >,
  }

  /// Parsed CORS allow-list.
  #[ derive( Debug, Clone ) ]
  pub enum CorsOrigins
  {
    /// `*`: any origin is allowed, `Access-Control-Allow-Origin: *`.
    Any,
    /// An explicit, comma-separated allow-list.
    List( Vec< String > ),
  }

  impl CorsOrigins
  {
    /// Returns the value to put in `Access-Control-Allow-Origin` for a
    /// request bearing the given `Origin` header, or `None` to omit the
    /// header (origin not allow-listed).
    #[ inline ]
    #[ must_use ]
    pub fn allow_origin_for< 'a >( &'a self, origin : Option< &'a str > ) -> Option< &'a str >
    {
      match self
      {
        Self::Any => Some( "*" ),
        Self::List( list ) =>
        {
          let origin = origin?;
          list.iter().any( | o | o == origin ).then_some( origin )
        }
      }
    }

    /// Whether `Vary: Origin` must be added (non-wildcard mode only).
    #[ inline ]
    #[ must_use ]
    pub fn is_wildcard( &self ) -> bool
    {
      matches!( self, Self::Any )
    }
  }

  fn env_var( name : &str ) -> Option< String >
  {
    env::var( name ).ok().filter( | v | !v.is_empty() )
  }

  fn parse_bool( raw : &str ) -> Option< bool >
  {
    match raw.trim().to_ascii_lowercase().as_str()
    {
      "1" | "true" | "yes" | "on" => Some( true ),
      "0" | "false" | "no" | "off" => Some( false ),
      _ => None,
    }
  }

  fn parse_num< T : std::str::FromStr >
  ( name : &str, raw : &str, warnings : &mut Vec< String > ) -> Option< T >
  {
    match raw.trim().parse::< T >()
    {
      Ok( v ) => Some( v ),
      Err( _ ) =>
      {
        warnings.push( format!( "ignoring unparseable value for {name}: {raw:?}" ) );
        None
      }
    }
  }

  fn resolve_data_dir( requested : Option< String >, warnings : &mut Vec< String > ) -> PathBuf
  {
    if let Some( requested ) = &requested
    {
      if std::path::Path::new( requested ).is_dir()
      {
        return PathBuf::from( requested );
      }
      warnings.push( format!( "configured data dir {requested:?} does not exist, probing candidates" ) );
    }

    for candidate in DATA_DIR_CANDIDATES
    {
      if std::path::Path::new( candidate ).is_dir()
      {
        return PathBuf::from( *candidate );
      }
    }

    // Static fallback: last candidate, created lazily by the supervisor.
    PathBuf::from( *DATA_DIR_CANDIDATES.last().unwrap() )
  }

  impl Config
  {
    /// Load and validate configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`GatewayError::MissingConfig`] if a required variable is
    /// absent, or [`GatewayError::InvalidConfig`] if present values
    /// contradict each other (e.g. `MAX_CONCURRENT < 1`).
    pub fn from_env() -> Result< Self >
    {
      let mut warnings = Vec::new();
      Self::warn_unrecognized( &mut warnings );

      let model_reference = env_var( "MODEL_REFERENCE" )
        .ok_or_else( || GatewayError::MissingConfig( "MODEL_REFERENCE".to_string() ) )?;

      // Deprecated-name handling: accept only the new name; if the old
      // name is present, warn and ignore it entirely.
      if env_var( "INFERENCE_PORT" ).is_some()
      {
        warnings.push(
          "INFERENCE_PORT is deprecated and ignored; set BACKEND_PORT instead".to_string()
        );
      }

      let backend_port = env_var( "BACKEND_PORT" )
        .and_then( | v | parse_num::< u16 >( "BACKEND_PORT", &v, &mut warnings ) )
        .unwrap_or( 8080 );

      let gateway_port = env_var( "GATEWAY_PORT" )
        .and_then( | v | parse_num::< u16 >( "GATEWAY_PORT", &v, &mut warnings ) )
        .unwrap_or( 8000 );

      let health_port = env_var( "HEALTH_PORT" )
        .and_then( | v | parse_num::< u16 >( "HEALTH_PORT", &v, &mut warnings ) )
        .unwrap_or( 8001 );

      let backend_host = env_var( "BACKEND_HOST" ).unwrap_or_else( || "127.0.0.1".to_string() );

      let auth_enabled = env_var( "AUTH_ENABLED" )
        .and_then( | v | parse_bool( &v ) )
        .unwrap_or( true );

      let metrics_require_auth = env_var( "METRICS_REQUIRE_AUTH" )
        .and_then( | v | parse_bool( &v ) )
        .unwrap_or( false );

      let global_rate_limit_per_minute = env_var( "GLOBAL_RATE_LIMIT_PER_MINUTE" )
        .and_then( | v | parse_num::< u32 >( "GLOBAL_RATE_LIMIT_PER_MINUTE", &v, &mut warnings ) )
        .unwrap_or( 100 );

      let max_concurrent = env_var( "MAX_CONCURRENT" )
        .and_then( | v | parse_num::< usize >( "MAX_CONCURRENT", &v, &mut warnings ) )
        .unwrap_or( 1 );

      let max_queue_size = env_var( "MAX_QUEUE_SIZE" )
        .and_then( | v | parse_num::< usize >( "MAX_QUEUE_SIZE", &v, &mut warnings ) )
        .unwrap_or( 0 );

      let max_request_body = env_var( "MAX_REQUEST_BODY" )
        .and_then( | v | parse_num::< usize >( "MAX_REQUEST_BODY", &v, &mut warnings ) )
        .unwrap_or( 10_485_760 );

      let max_headers = env_var( "MAX_HEADERS" )
        .and_then( | v | parse_num::< usize >( "MAX_HEADERS", &v, &mut warnings ) )
        .unwrap_or( 64 );

      let max_header_line = env_var( "MAX_HEADER_LINE" )
        .and_then( | v | parse_num::< usize >( "MAX_HEADER_LINE", &v, &mut warnings ) )
        .unwrap_or( 8_192 );

      let max_request_line = env_var( "MAX_REQUEST_LINE" )
        .and_then( | v | parse_num::< usize >( "MAX_REQUEST_LINE", &v, &mut warnings ) )
        .unwrap_or( 8_192 );

      let max_response_header_total = env_var( "MAX_RESPONSE_HEADER_TOTAL" )
        .and_then( | v | parse_num::< usize >( "MAX_RESPONSE_HEADER_TOTAL", &v, &mut warnings ) )
        .unwrap_or( 65_536 );

      let request_timeout = Duration::from_secs(
        env_var( "REQUEST_TIMEOUT_SECS" )
          .and_then( | v | parse_num::< u64 >( "REQUEST_TIMEOUT_SECS", &v, &mut warnings ) )
          .unwrap_or( 300 )
      );

      let backend_connect_timeout = Duration::from_secs(
        env_var( "BACKEND_CONNECT_TIMEOUT_SECS" )
          .and_then( | v | parse_num::< u64 >( "BACKEND_CONNECT_TIMEOUT_SECS", &v, &mut warnings ) )
          .unwrap_or( 10 )
      );

      let client_header_timeout = Duration::from_secs(
        env_var( "CLIENT_HEADER_TIMEOUT_SECS" )
          .and_then( | v | parse_num::< u64 >( "CLIENT_HEADER_TIMEOUT_SECS", &v, &mut warnings ) )
          .unwrap_or( 30 )
      );

      let health_poll_timeout = Duration::from_secs(
        env_var( "HEALTH_POLL_TIMEOUT_SECS" )
          .and_then( | v | parse_num::< u64 >( "HEALTH_POLL_TIMEOUT_SECS", &v, &mut warnings ) )
          .unwrap_or( 2 )
      );

      let shutdown_drain_deadline = Duration::from_secs(
        env_var( "SHUTDOWN_DRAIN_DEADLINE_SECS" )
          .and_then( | v | parse_num::< u64 >( "SHUTDOWN_DRAIN_DEADLINE_SECS", &v, &mut warnings ) )
          .unwrap_or( 30 )
      );

      let cors_origins = env_var( "CORS_ORIGINS" ).map( | raw |
        if raw.trim() == "*"
        {
          CorsOrigins::Any
        }
        else
        {
          CorsOrigins::List( raw.split( ',' ).map( | s | s.trim().to_string() ).filter( | s | !s.is_empty() ).collect() )
        }
      );

      let data_dir = resolve_data_dir( env_var( "DATA_DIR" ), &mut warnings );

      let auth_keys_file = env_var( "AUTH_KEYS_FILE" )
        .map( PathBuf::from )
        .unwrap_or_else( || data_dir.join( "api_keys.txt" ) );

      let log_format = match env_var( "LOG_FORMAT" ).as_deref()
      {
        Some( "json" ) => LogFormat::Json,
        Some( other ) if other != "text" =>
        {
          warnings.push( format!( "unrecognized LOG_FORMAT {other:?}, defaulting to text" ) );
          LogFormat::Text
        }
        _ => LogFormat::Text,
      };

      let worker_type_tag = env_var( "WORKER_TYPE_TAG" ).unwrap_or_default();
      let debug_hold = env_var( "DEBUG_HOLD" ).and_then( | v | parse_bool( &v ) ).unwrap_or( false );

      let backend_command = env_var( "BACKEND_COMMAND" ).map( | raw |
        raw.split_whitespace().map( str::to_string ).collect::< Vec< _ > >()
      );

      let config = Self
      {
        gateway_port,
        health_port,
        backend_port,
        backend_host,
        auth_enabled,
        auth_keys_file,
        global_rate_limit_per_minute,
        metrics_require_auth,
        max_concurrent,
        max_queue_size,
        max_request_body,
        max_headers,
        max_header_line,
        max_request_line,
        max_response_header_total,
        request_timeout,
        backend_connect_timeout,
        client_header_timeout,
        health_poll_timeout,
        shutdown_drain_deadline,
        cors_origins,
        data_dir,
        log_format,
        worker_type_tag,
        debug_hold,
        model_reference,
        backend_command,
        warnings,
      };

      config.validate()?;
      Ok( config )
    }

    fn warn_unrecognized( warnings : &mut Vec< String > )
    {
      const KNOWN_PREFIX : &str = "GATEWAY_";
      for ( key, _ ) in env::vars()
      {
        if key.starts_with( KNOWN_PREFIX ) && !Self::is_recognized( &key )
        {
          warnings.push( format!( "unrecognized environment variable {key}" ) );
        }
      }
    }

    fn is_recognized( key : &str ) -> bool
    {
      // Only variables under our own namespace are checked for typos; the
      // bulk of recognized variables (BACKEND_*, MAX_*, ...) live outside
      // it deliberately, matching the upstream backend's own env surface.
      matches!( key, "GATEWAY_PORT" | "GATEWAY_RESERVED" )
    }

    fn validate( &self ) -> Result< () >
    {
      if self.max_concurrent < 1
      {
        return Err( GatewayError::InvalidConfig
        {
          field : "MAX_CONCURRENT".to_string(),
          reason : "must be >= 1".to_string(),
        } );
      }
      if self.model_reference.trim().is_empty()
      {
        return Err( GatewayError::MissingConfig( "MODEL_REFERENCE".to_string() ) );
      }
      if !is_loopback_host( &self.backend_host )
      {
        return Err( GatewayError::InvalidConfig
        {
          field : "BACKEND_HOST".to_string(),
          reason : format!( "{} is not a loopback address", self.backend_host ),
        } );
      }
      Ok( () )
    }

    /// Path to the boot transcript directory.
    #[ inline ]
    #[ must_use ]
    pub fn boot_log_dir( &self ) -> PathBuf
    {
      self.data_dir.join( "logs" ).join( "_boot" )
    }

    /// Path to the backend's own log subdirectory.
    #[ inline ]
    #[ must_use ]
    pub fn worker_log_dir( &self ) -> PathBuf
    {
      let name = if self.worker_type_tag.is_empty() { "worker".to_string() } else { self.worker_type_tag.clone() };
      self.data_dir.join( "logs" ).join( name )
    }

    /// Path to the gateway access log.
    #[ inline ]
    #[ must_use ]
    pub fn access_log_path( &self ) -> PathBuf
    {
      self.data_dir.join( "logs" ).join( "api_access.log" )
    }
  }

  fn is_loopback_host( host : &str ) -> bool
  {
    if host == "localhost"
    {
      return true;
    }
    host.parse::< std::net::IpAddr >().map( | ip | ip.is_loopback() ).unwrap_or( false )
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn cors_any_allows_everything()
    {
      let cors = CorsOrigins::Any;
      assert_eq!( cors.allow_origin_for( Some( "https://x.test" ) ), Some( "*" ) );
      assert!( cors.is_wildcard() );
    }

    #[ test ]
    fn cors_list_rejects_unlisted_origin()
    {
      let cors = CorsOrigins::List( vec![ "https://ok.test".to_string() ] );
      assert_eq!( cors.allow_origin_for( Some( "https://ok.test" ) ), Some( "https://ok.test" ) );
      assert_eq!( cors.allow_origin_for( Some( "https://bad.test" ) ), None );
      assert!( !cors.is_wildcard() );
    }

    #[ test ]
    fn loopback_host_detection()
    {
      assert!( is_loopback_host( "127.0.0.1" ) );
      assert!( is_loopback_host( "localhost" ) );
      assert!( is_loopback_host( "::1" ) );
      assert!( !is_loopback_host( "10.0.0.5" ) );
    }
  }
}

pub use private::{ Config, CorsOrigins, LogFormat };
