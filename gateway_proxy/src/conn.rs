//! The per-connection task: one accepted TCP connection, parsed,
//! routed, authenticated, admitted, and proxied.

mod private
{
  use crate::
  {
    backend_status::BackendStatus,
    cors,
    error::ProxyError,
    gate::ConcurrencyGate,
    http_parse::{ self, IngressLimits },
    http_types::{ BodyFraming, HeaderMap },
    http_write::{ write_head, write_response },
    proxy::{ proxy_request, BackendTarget },
    routes::{ match_route, Route },
  };
  use gateway_auth::Authenticator;
  use gateway_core::{ AccessLogEntry, AccessLogHandle, Config, CorsOrigins, MetricsRegistry };
  use secrecy::{ ExposeSecret, SecretString };
  use serde::Serialize;
  use std::sync::Arc;
  use std::time::Instant;
  use tokio::io::{ AsyncRead, AsyncWrite, BufReader };

  /// Everything a connection task needs, shared across every connection
  /// and every request on it. Cheap to clone (every field is an `Arc` or
  /// `Copy`).
  #[ derive( Clone ) ]
  pub struct GatewayState
  {
    /// Validated process configuration.
    pub config : Arc< Config >,
    /// Key store plus rate limiter.
    pub authenticator : Arc< Authenticator >,
    /// Process-wide counters and gauges.
    pub metrics : Arc< MetricsRegistry >,
    /// Access log writer handle.
    pub access_log : AccessLogHandle,
    /// Admission control gate.
    pub gate : Arc< ConcurrencyGate >,
    /// The per-process backend credential, injected on every proxied
    /// request.
    pub credential : Arc< SecretString >,
    /// Cached backend reachability, refreshed by the supervisor.
    pub backend_status : Arc< BackendStatus >,
  }

  #[ derive( Serialize ) ]
  struct QueueStatus
  {
    max_concurrent : usize,
    max_queue_size : usize,
    active : i64,
    waiting : usize,
  }

  #[ derive( Serialize ) ]
  struct AuthenticationStatus
  {
    enabled : bool,
  }

  #[ derive( Serialize ) ]
  struct GatewayMetricsWrapper< 'a >
  {
    metrics : &'a gateway_core::MetricsSnapshot,
  }

  #[ derive( Serialize ) ]
  struct HealthBody< 'a >
  {
    status : &'static str,
    code : u16,
    backend : &'static str,
    gateway : GatewayMetricsWrapper< 'a >,
    queue : QueueStatus,
    authentication : AuthenticationStatus,
  }

  #[ derive( Serialize ) ]
  struct ReloadBody
  {
    status : &'static str,
    keys_loaded : usize,
  }

  fn ingress_limits( cfg : &Config ) -> IngressLimits
  {
    IngressLimits
    {
      max_request_line : cfg.max_request_line,
      max_headers : cfg.max_headers,
      max_header_line : cfg.max_header_line,
    }
  }

  /// Drive one accepted connection to completion. Reads exactly one
  /// request (the handler does not keep the connection alive across
  /// requests; every proxied or routed exchange closes the socket on
  /// completion, which keeps drain-on-shutdown bookkeeping trivial).
  pub async fn handle_connection< S >( stream : S, state : GatewayState )
  where
    S : AsyncRead + AsyncWrite + Unpin,
  {
    let ( read_half, mut write_half ) = tokio::io::split( stream );
    let mut reader = BufReader::new( read_half );
    let cfg = &state.config;

    let head = match tokio::time::timeout(
      cfg.client_header_timeout,
      http_parse::read_request_head( &mut reader, &ingress_limits( cfg ) ),
    ).await
    {
      Ok( Ok( head ) ) => head,
      Ok( Err( ProxyError::ClientDisconnected ) ) => return,
      Ok( Err( err ) ) => { respond_error( &mut write_half, &err, &state, None ).await; return; }
      Err( _elapsed ) => return, // slow-loris: close without response
    };

    state.metrics.inc_requests_total();

    let origin = head.headers.get( "origin" ).map( str::to_string );
    let path = head.path().to_string();
    let route = match_route( &head.method, &path );

    let framing = match http_parse::body_framing( &head.headers, cfg.max_request_body as u64 )
    {
      Ok( framing ) => framing,
      Err( err ) => { respond_error( &mut write_half, &err, &state, origin.as_deref() ).await; return; }
    };

    let outcome = dispatch( route, &head, framing, &mut reader, &mut write_half, &state, origin.as_deref() ).await;

    if let Some( ( status, key_id ) ) = outcome
    {
      log_completion( &state, &key_id, &head.method, &path, status );
    }
  }

  #[ allow( clippy::too_many_lines ) ]
  async fn dispatch< R, W >
  (
    route : Route,
    head : &crate::http_types::RequestHead,
    framing : BodyFraming,
    reader : &mut R,
    writer : &mut W,
    state : &GatewayState,
    origin : Option< &str >,
  ) -> Option< ( u16, String ) >
  where
    R : AsyncRead + Unpin,
    W : AsyncWrite + Unpin,
  {
    let cors = state.config.cors_origins.as_ref();

    if route == Route::Preflight
    {
      let headers = cors::preflight_headers( cors, origin );
      let _ = write_response( writer, 204, &headers, &[] ).await;
      return Some( ( 204, "-".to_string() ) );
    }

    let auth_required = ( route.requires_auth() && state.config.auth_enabled )
      || ( route == Route::Metrics && state.config.metrics_require_auth );

    let mut key_id = "-".to_string();
    if auth_required
    {
      let authorization = head.headers.get( "authorization" );
      match state.authenticator.authenticate( authorization, chrono::Utc::now() )
      {
        Ok( authenticated ) =>
        {
          state.metrics.inc_requests_authenticated();
          key_id = authenticated.key_id;
        }
        Err( auth_err ) =>
        {
          state.metrics.inc_requests_unauthorized();
          let err = ProxyError::Auth( auth_err );
          respond_error( writer, &err, state, origin ).await;
          return Some( ( err.to_response().status, "-".to_string() ) );
        }
      }
    }

    let status = match route
    {
      Route::Ping =>
      {
        let mut headers = HeaderMap::new();
        cors::apply( &mut headers, cors, origin );
        let _ = write_response( writer, 200, &headers, &[] ).await;
        state.metrics.inc_requests_success();
        200
      }
      Route::Health => { serve_health( writer, state, cors, origin ).await; 200 }
      Route::Metrics => { serve_metrics( head, writer, state, cors, origin ).await; 200 }
      Route::Reload => serve_reload( writer, state, cors, origin ).await,
      Route::Preflight => unreachable!( "handled above" ),
      Route::Proxy => serve_proxy( head, framing, reader, writer, state, cors, origin ).await,
    };

    Some( ( status, key_id ) )
  }

  async fn serve_health< W : AsyncWrite + Unpin >
  ( writer : &mut W, state : &GatewayState, cors : Option< &CorsOrigins >, origin : Option< &str > )
  {
    let snapshot = state.metrics.snapshot();
    let body = HealthBody
    {
      status : "ok",
      code : 200,
      backend : if state.backend_status.is_healthy() { "reachable" } else { "unreachable" },
      gateway : GatewayMetricsWrapper { metrics : &snapshot },
      queue : QueueStatus
      {
        max_concurrent : state.config.max_concurrent,
        max_queue_size : state.config.max_queue_size,
        active : snapshot.requests_active,
        waiting : state.gate.queue_depth(),
      },
      authentication : AuthenticationStatus { enabled : state.config.auth_enabled },
    };
    let json = serde_json::to_vec( &body ).unwrap_or_default();
    let mut headers = HeaderMap::new();
    headers.insert( "Content-Type", "application/json".to_string() );
    cors::apply( &mut headers, cors, origin );
    let _ = write_response( writer, 200, &headers, &json ).await;
  }

  async fn serve_metrics< W : AsyncWrite + Unpin >
  ( head : &crate::http_types::RequestHead, writer : &mut W, state : &GatewayState, cors : Option< &CorsOrigins >, origin : Option< &str > )
  {
    let accept = head.headers.get( "accept" ).unwrap_or( "" );
    let wants_text = accept.contains( "text/plain" ) || accept.contains( "application/openmetrics-text" );
    let snapshot = state.metrics.snapshot();

    let mut headers = HeaderMap::new();
    cors::apply( &mut headers, cors, origin );

    if wants_text
    {
      headers.insert( "Content-Type", "text/plain; version=0.0.4".to_string() );
      let body = snapshot.to_text_exposition();
      let _ = write_response( writer, 200, &headers, body.as_bytes() ).await;
    }
    else
    {
      headers.insert( "Content-Type", "application/json".to_string() );
      let body = serde_json::to_vec( &snapshot ).unwrap_or_default();
      let _ = write_response( writer, 200, &headers, &body ).await;
    }
  }

  async fn serve_reload< W : AsyncWrite + Unpin >
  ( writer : &mut W, state : &GatewayState, cors : Option< &CorsOrigins >, origin : Option< &str > ) -> u16
  {
    let mut headers = HeaderMap::new();
    cors::apply( &mut headers, cors, origin );
    match state.authenticator.reload()
    {
      Ok( keys_loaded ) =>
      {
        headers.insert( "Content-Type", "application/json".to_string() );
        let body = serde_json::to_vec( &ReloadBody { status : "ok", keys_loaded } ).unwrap_or_default();
        let _ = write_response( writer, 200, &headers, &body ).await;
        state.metrics.inc_requests_success();
        200
      }
      Err( reason ) =>
      {
        tracing::warn!( reason = %reason, "key file reload rejected, prior store retained" );
        let err = ProxyError::ReloadFailed( reason );
        respond_error( writer, &err, state, origin ).await;
        500
      }
    }
  }

  #[ allow( clippy::too_many_arguments ) ]
  async fn serve_proxy< R, W >
  (
    head : &crate::http_types::RequestHead,
    framing : BodyFraming,
    reader : &mut R,
    writer : &mut W,
    state : &GatewayState,
    cors : Option< &CorsOrigins >,
    origin : Option< &str >,
  ) -> u16
  where
    R : AsyncRead + Unpin,
    W : AsyncWrite + Unpin,
  {
    let enqueued_at = Instant::now();
    let admission = match state.gate.admit().await
    {
      Ok( admission ) => admission,
      Err( err ) =>
      {
        state.metrics.inc_queue_rejections();
        respond_error( writer, &err, state, origin ).await;
        return err.to_response().status;
      }
    };
    state.metrics.add_queue_wait( enqueued_at.elapsed() );
    state.metrics.inc_requests_active();

    let mut extra_headers = HeaderMap::new();
    cors::apply( &mut extra_headers, cors, origin );

    let target = BackendTarget
    {
      host : &state.config.backend_host,
      port : state.config.backend_port,
      credential : state.credential.expose_secret(),
      connect_timeout : state.config.backend_connect_timeout,
      max_response_header_total : state.config.max_response_header_total,
      request_timeout : state.config.request_timeout,
    };

    let mut buf_reader = BufReader::new( reader );
    let result = proxy_request( &target, head, framing, &mut buf_reader, writer, &extra_headers ).await;

    state.metrics.dec_requests_active();
    drop( admission );

    match result
    {
      Ok( outcome ) =>
      {
        state.metrics.add_bytes_sent( outcome.bytes_sent );
        if ( 200..400 ).contains( &outcome.status )
        {
          state.metrics.inc_requests_success();
        }
        else
        {
          state.metrics.inc_requests_error();
        }
        outcome.status
      }
      Err( err ) =>
      {
        state.metrics.inc_requests_error();
        let response = err.to_response();
        if response.status != 0
        {
          let mut headers = HeaderMap::new();
          for ( name, value ) in &response.extra_headers
          {
            headers.insert( name, value.clone() );
          }
          cors::apply( &mut headers, cors, origin );
          headers.insert( "Content-Type", "application/json".to_string() );
          let body = serde_json::to_vec( &response.envelope ).unwrap_or_default();
          let _ = write_response( writer, response.status, &headers, &body ).await;
        }
        response.status
      }
    }
  }

  async fn respond_error< W : AsyncWrite + Unpin >
  ( writer : &mut W, err : &ProxyError, state : &GatewayState, origin : Option< &str > )
  {
    let response = err.to_response();
    if response.status == 0
    {
      return; // client disconnect / header timeout: no response is sent
    }
    let mut headers = HeaderMap::new();
    for ( name, value ) in &response.extra_headers
    {
      headers.insert( name, value.clone() );
    }
    cors::apply( &mut headers, state.config.cors_origins.as_ref(), origin );
    headers.insert( "Content-Type", "application/json".to_string() );
    let body = serde_json::to_vec( &response.envelope ).unwrap_or_default();
    let _ = write_head( writer, response.status, &headers ).await;
    let _ = tokio::io::AsyncWriteExt::write_all( writer, &body ).await;
  }

  fn log_completion( state : &GatewayState, key_id : &str, method : &str, path : &str, status : u16 )
  {
    state.access_log.record( AccessLogEntry
    {
      timestamp : chrono::Utc::now().to_rfc3339(),
      key_id : key_id.to_string(),
      method : method.to_string(),
      path : path.to_string(),
      status,
    } );
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn ingress_limits_mirror_config()
    {
      let cfg = test_config();
      let limits = ingress_limits( &cfg );
      assert_eq!( limits.max_request_line, cfg.max_request_line );
      assert_eq!( limits.max_headers, cfg.max_headers );
    }

    fn test_config() -> Config
    {
      std::env::set_var( "MODEL_REFERENCE", "test-model" );
      Config::from_env().expect( "config should build from env in test" )
    }
  }
}

pub use private::{ handle_connection, GatewayState };
