//! The route table: first match wins, exact path or `OPTIONS *`.
//! Deliberately a flat explicit structure rather than a macro or
//! reflection-based router.

mod private
{
  /// What a matched request should do next.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum Route
  {
    /// `GET /ping`.
    Ping,
    /// `GET /health`.
    Health,
    /// `GET /metrics`.
    Metrics,
    /// `OPTIONS *` (any path).
    Preflight,
    /// `POST /reload`.
    Reload,
    /// Anything else: proxied to the backend, authentication required.
    Proxy,
  }

  impl Route
  {
    /// Whether this route requires a valid API key.
    #[ must_use ]
    pub fn requires_auth( self ) -> bool
    {
      matches!( self, Self::Reload | Self::Proxy )
    }

    /// Whether this route passes through the concurrency gate.
    #[ must_use ]
    pub fn uses_gate( self ) -> bool
    {
      matches!( self, Self::Proxy )
    }
  }

  /// Match `(method, path)` to a [`Route`]. `path` must already have any
  /// query string stripped.
  #[ must_use ]
  pub fn match_route( method : &str, path : &str ) -> Route
  {
    if method.eq_ignore_ascii_case( "OPTIONS" )
    {
      return Route::Preflight;
    }
    match ( method, path )
    {
      ( "GET", "/ping" ) => Route::Ping,
      ( "GET", "/health" ) => Route::Health,
      ( "GET", "/metrics" ) => Route::Metrics,
      ( "POST", "/reload" ) => Route::Reload,
      _ => Route::Proxy,
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn options_matches_any_path_first()
    {
      assert_eq!( match_route( "OPTIONS", "/v1/chat/completions" ), Route::Preflight );
      assert_eq!( match_route( "options", "/ping" ), Route::Preflight );
    }

    #[ test ]
    fn unmatched_paths_fall_through_to_proxy()
    {
      assert_eq!( match_route( "GET", "/v1/models" ), Route::Proxy );
      assert_eq!( match_route( "POST", "/v1/chat/completions" ), Route::Proxy );
    }

    #[ test ]
    fn proxy_and_reload_require_auth_ping_and_health_do_not()
    {
      assert!( Route::Proxy.requires_auth() );
      assert!( Route::Reload.requires_auth() );
      assert!( !Route::Ping.requires_auth() );
      assert!( !Route::Health.requires_auth() );
      assert!( !Route::Metrics.requires_auth() );
    }
  }
}

pub use private::{ match_route, Route };
