//! Proxy-layer error type and its single mapping to an HTTP status and
//! error-envelope `code`.

mod private
{
  use gateway_auth::AuthError;

  /// Every failure class the request pipeline can produce, one-to-one
  /// with the "Kinds of errors" table in the error-handling design.
  #[ derive( Debug, thiserror::Error ) ]
  #[ non_exhaustive ]
  pub enum ProxyError
  {
    /// The request line exceeded `MaxRequestLine`.
    #[ error( "request line too long" ) ]
    RequestLineTooLong,
    /// The request line was present but not well-formed
    /// (`METHOD target HTTP/x.y`).
    #[ error( "malformed request line" ) ]
    MalformedRequestLine,
    /// Too many headers, or one header line exceeded `MaxHeaderLine`.
    #[ error( "headers too large" ) ]
    HeadersTooLarge,
    /// `Content-Length` exceeded `MaxRequestBody`.
    #[ error( "request body too large" ) ]
    BodyTooLarge,
    /// `Content-Length` present but not a valid non-negative integer.
    #[ error( "malformed Content-Length" ) ]
    MalformedContentLength,
    /// The client did not finish sending headers within the timeout.
    #[ error( "client header timeout" ) ]
    ClientHeaderTimeout,
    /// The client closed the connection before a full request arrived.
    #[ error( "client disconnected" ) ]
    ClientDisconnected,

    /// Authentication failed; wraps the specific reason.
    #[ error( "authentication failed: {0}" ) ]
    Auth( #[ from ] AuthError ),

    /// The admission queue was full.
    #[ error( "queue full" ) ]
    QueueFull,

    /// TCP connect to the backend failed or timed out.
    #[ error( "backend unreachable" ) ]
    BackendUnreachable,
    /// The backend's response headers exceeded `MaxResponseHeaderTotal`.
    #[ error( "backend response headers too large" ) ]
    BackendHeadersTooLarge,
    /// The end-to-end request timeout elapsed before any response bytes
    /// were sent.
    #[ error( "backend timed out" ) ]
    BackendTimeout,

    /// Key-file reload was requested but the file failed to parse.
    #[ error( "reload failed: {0}" ) ]
    ReloadFailed( String ),

    /// Catch-all for unexpected internal failures; never exposes detail
    /// to the client.
    #[ error( "internal error" ) ]
    Internal,
  }

  /// Convenience alias used throughout the proxy crate.
  pub type Result< T > = core::result::Result< T, ProxyError >;

  /// The JSON error envelope shape used by every error response.
  #[ derive( Debug, Clone, serde::Serialize ) ]
  pub struct ErrorEnvelope
  {
    /// The single `error` object.
    pub error : ErrorBody,
  }

  /// The body of an [`ErrorEnvelope`].
  #[ derive( Debug, Clone, serde::Serialize ) ]
  pub struct ErrorBody
  {
    /// Human-readable message; never includes internal paths or config.
    pub message : String,
    /// Broad error category, e.g. `invalid_request_error`.
    #[ serde( rename = "type" ) ]
    pub kind : String,
    /// Stable machine-readable code, e.g. `invalid_api_key`.
    pub code : String,
    /// Offending parameter name, when applicable.
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    pub param : Option< String >,
  }

  /// What an error response needs beyond the envelope body: status code
  /// and any extra headers (`Retry-After`).
  #[ derive( Debug, Clone ) ]
  pub struct ErrorResponse
  {
    /// HTTP status code to send.
    pub status : u16,
    /// The JSON envelope.
    pub envelope : ErrorEnvelope,
    /// Extra headers, e.g. `("Retry-After", "60")`.
    pub extra_headers : Vec< ( &'static str, String ) >,
  }

  impl ProxyError
  {
    /// Map this error to its HTTP status, envelope, and extra headers.
    #[ must_use ]
    pub fn to_response( &self ) -> ErrorResponse
    {
      let ( status, kind, code, message, extra_headers ) : ( u16, &str, &str, String, Vec< ( &'static str, String ) > ) = match self
      {
        Self::RequestLineTooLong =>
          ( 414, "invalid_request_error", "request_line_too_long", "Request line too long".to_string(), vec![] ),
        Self::MalformedRequestLine =>
          ( 400, "invalid_request_error", "bad_request", "Malformed request line".to_string(), vec![] ),
        Self::HeadersTooLarge =>
          ( 431, "invalid_request_error", "headers_too_large", "Request headers too large".to_string(), vec![] ),
        Self::BodyTooLarge =>
          ( 413, "invalid_request_error", "request_too_large", "Request body too large".to_string(), vec![] ),
        Self::MalformedContentLength =>
          ( 400, "invalid_request_error", "malformed_content_length", "Malformed Content-Length header".to_string(), vec![] ),
        Self::ClientHeaderTimeout | Self::ClientDisconnected =>
          ( 0, "invalid_request_error", "client_error", String::new(), vec![] ), // no response is sent for these
        Self::Auth( auth_err ) => auth_error_response( auth_err ),
        Self::QueueFull =>
          ( 503, "server_error", "queue_full", "Server is at capacity, try again shortly".to_string(), vec![ ( "Retry-After", "5".to_string() ) ] ),
        Self::BackendUnreachable =>
          ( 502, "server_error", "backend_unreachable", "Upstream backend is unreachable".to_string(), vec![] ),
        Self::BackendHeadersTooLarge =>
          ( 502, "server_error", "backend_unreachable", "Upstream backend returned malformed headers".to_string(), vec![] ),
        Self::BackendTimeout =>
          ( 504, "server_error", "backend_timeout", "Upstream backend timed out".to_string(), vec![] ),
        Self::ReloadFailed( _reason ) =>
          ( 500, "server_error", "reload_failed", "Key file reload failed".to_string(), vec![] ),
        Self::Internal =>
          ( 500, "server_error", "server_error", "Internal server error".to_string(), vec![] ),
      };

      ErrorResponse
      {
        status,
        envelope : ErrorEnvelope
        {
          error : ErrorBody { message, kind : kind.to_string(), code : code.to_string(), param : None },
        },
        extra_headers,
      }
    }
  }

  fn auth_error_response( err : &AuthError ) -> ( u16, &'static str, &'static str, String, Vec< ( &'static str, String ) > )
  {
    match err
    {
      AuthError::MissingHeader =>
        ( 401, "invalid_request_error", "invalid_api_key", "Missing Authorization header".to_string(), vec![] ),
      AuthError::InvalidFormat =>
        ( 401, "invalid_request_error", "invalid_api_key", "Invalid API key format".to_string(), vec![] ),
      AuthError::NoMatch =>
        ( 401, "invalid_request_error", "invalid_api_key", "Invalid API key".to_string(), vec![] ),
      AuthError::Expired =>
        ( 401, "invalid_request_error", "invalid_api_key", "API key has expired".to_string(), vec![] ),
      AuthError::RateLimited =>
        ( 429, "server_error", "rate_limit_exceeded", "Rate limit exceeded".to_string(), vec![ ( "Retry-After", "60".to_string() ) ] ),
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn queue_full_carries_retry_after_5()
    {
      let response = ProxyError::QueueFull.to_response();
      assert_eq!( response.status, 503 );
      assert_eq!( response.envelope.error.code, "queue_full" );
      assert_eq!( response.extra_headers, vec![ ( "Retry-After", "5".to_string() ) ] );
    }

    #[ test ]
    fn rate_limited_carries_retry_after_60()
    {
      let response = ProxyError::Auth( AuthError::RateLimited ).to_response();
      assert_eq!( response.status, 429 );
      assert_eq!( response.envelope.error.code, "rate_limit_exceeded" );
      assert_eq!( response.extra_headers, vec![ ( "Retry-After", "60".to_string() ) ] );
    }

    #[ test ]
    fn missing_auth_header_yields_invalid_api_key_envelope()
    {
      let response = ProxyError::Auth( AuthError::MissingHeader ).to_response();
      assert_eq!( response.status, 401 );
      assert_eq!( response.envelope.error.message, "Missing Authorization header" );
      assert_eq!( response.envelope.error.code, "invalid_api_key" );
    }
  }
}

pub use private::{ ErrorBody, ErrorEnvelope, ErrorResponse, ProxyError, Result };
