//! CORS header injection. A thin function, not middleware — the
//! per-connection handler calls it once while building every response,
//! including error responses.

mod private
{
  use gateway_core::CorsOrigins;
  use crate::http_types::HeaderMap;

  /// Methods advertised on `Access-Control-Allow-Methods` for a CORS
  /// preflight reply.
  const ALLOWED_METHODS : &str = "GET, POST, OPTIONS";

  /// Append the appropriate `Access-Control-*` headers to `headers` for a
  /// response to a request carrying `origin`, given the configured
  /// allow-list. A no-op when `cors` is `None` or `origin` is `None` or
  /// not allow-listed.
  pub fn apply( headers : &mut HeaderMap, cors : Option< &CorsOrigins >, origin : Option< &str > )
  {
    let Some( cors ) = cors else { return };
    let Some( allowed ) = cors.allow_origin_for( origin ) else { return };

    headers.insert( "Access-Control-Allow-Origin", allowed.to_string() );
    if !cors.is_wildcard()
    {
      headers.insert( "Vary", "Origin".to_string() );
    }
  }

  /// Build the extra headers for an `OPTIONS` preflight reply, or `None`
  /// if CORS is disabled or the origin is not allow-listed (the preflight
  /// then falls back to a plain 204 with no CORS headers).
  #[ must_use ]
  pub fn preflight_headers( cors : Option< &CorsOrigins >, origin : Option< &str > ) -> HeaderMap
  {
    let mut headers = HeaderMap::new();
    apply( &mut headers, cors, origin );
    if headers.contains( "Access-Control-Allow-Origin" )
    {
      headers.insert( "Access-Control-Allow-Methods", ALLOWED_METHODS.to_string() );
      headers.insert( "Access-Control-Allow-Headers", "Authorization, Content-Type".to_string() );
      headers.insert( "Access-Control-Max-Age", "86400".to_string() );
    }
    headers
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn wildcard_omits_vary_origin()
    {
      let mut headers = HeaderMap::new();
      apply( &mut headers, Some( &CorsOrigins::Any ), Some( "https://x.test" ) );
      assert_eq!( headers.get( "Access-Control-Allow-Origin" ), Some( "*" ) );
      assert_eq!( headers.get( "Vary" ), None );
    }

    #[ test ]
    fn allow_list_adds_vary_origin()
    {
      let cors = CorsOrigins::List( vec![ "https://ok.test".to_string() ] );
      let mut headers = HeaderMap::new();
      apply( &mut headers, Some( &cors ), Some( "https://ok.test" ) );
      assert_eq!( headers.get( "Access-Control-Allow-Origin" ), Some( "https://ok.test" ) );
      assert_eq!( headers.get( "Vary" ), Some( "Origin" ) );
    }

    #[ test ]
    fn unlisted_origin_is_skipped_silently()
    {
      let cors = CorsOrigins::List( vec![ "https://ok.test".to_string() ] );
      let mut headers = HeaderMap::new();
      apply( &mut headers, Some( &cors ), Some( "https://bad.test" ) );
      assert!( !headers.contains( "Access-Control-Allow-Origin" ) );
    }

    #[ test ]
    fn disabled_cors_never_adds_headers()
    {
      let mut headers = HeaderMap::new();
      apply( &mut headers, None, Some( "https://x.test" ) );
      assert!( headers.is_empty() );
    }
  }
}

pub use private::{ apply, preflight_headers };
