//! A pure, tagged-result HTTP/1.1 head parser: ingress parsing never
//! panics or throws, every outcome (success, limit exceeded, malformed
//! input) comes back as an explicit value the caller matches on.
//!
//! Every limit is checked incrementally, byte by byte, rather than after
//! buffering an unbounded line — an oversized request line or header is
//! rejected the moment it crosses the limit, not after it has already
//! been read into memory.

mod private
{
  use crate::{ error::{ ProxyError, Result }, http_types::{ HeaderMap, RequestHead, ResponseHead } };
  use tokio::io::{ AsyncBufRead, AsyncReadExt };

  /// Limits applied while reading the client's request head.
  #[ derive( Debug, Clone, Copy ) ]
  pub struct IngressLimits
  {
    /// Cap on the request line, in bytes.
    pub max_request_line : usize,
    /// Cap on the number of header lines.
    pub max_headers : usize,
    /// Cap on a single header line, in bytes.
    pub max_header_line : usize,
  }

  enum LineOutcome
  {
    Line( String ),
    Eof,
    TooLong,
  }

  async fn read_line_capped< R : AsyncBufRead + Unpin >( reader : &mut R, cap : usize ) -> std::io::Result< LineOutcome >
  {
    let mut buf : Vec< u8 > = Vec::new();
    loop
    {
      let mut byte = [ 0u8; 1 ];
      let n = reader.read( &mut byte ).await?;
      if n == 0
      {
        return Ok( if buf.is_empty() { LineOutcome::Eof } else { LineOutcome::TooLong } );
      }
      if byte[ 0 ] == b'\n'
      {
        if buf.last() == Some( &b'\r' )
        {
          buf.pop();
        }
        return Ok( LineOutcome::Line( String::from_utf8_lossy( &buf ).into_owned() ) );
      }
      buf.push( byte[ 0 ] );
      if buf.len() > cap
      {
        return Ok( LineOutcome::TooLong );
      }
    }
  }

  /// Read and parse the client's request line and headers.
  ///
  /// Callers are expected to wrap this in `tokio::time::timeout` using
  /// `ClientHeaderTimeout`; a timeout firing should be treated as
  /// [`ProxyError::ClientHeaderTimeout`] by the caller.
  ///
  /// # Errors
  /// See [`ProxyError`] variants `RequestLineTooLong`, `HeadersTooLarge`,
  /// `MalformedRequestLine`, and `ClientDisconnected`.
  pub async fn read_request_head< R : AsyncBufRead + Unpin >( reader : &mut R, limits : &IngressLimits ) -> Result< RequestHead >
  {
    let request_line = match read_line_capped( reader, limits.max_request_line ).await
    {
      Ok( LineOutcome::Line( line ) ) => line,
      Ok( LineOutcome::Eof ) => return Err( ProxyError::ClientDisconnected ),
      Ok( LineOutcome::TooLong ) => return Err( ProxyError::RequestLineTooLong ),
      Err( _ ) => return Err( ProxyError::ClientDisconnected ),
    };

    let mut parts = request_line.splitn( 3, ' ' );
    let ( method, target, version ) = match ( parts.next(), parts.next(), parts.next() )
    {
      ( Some( m ), Some( t ), Some( v ) ) if !m.is_empty() && !t.is_empty() && v.starts_with( "HTTP/" ) =>
        ( m.to_ascii_uppercase(), t.to_string(), v.to_string() ),
      _ => return Err( ProxyError::MalformedRequestLine ),
    };

    let mut headers = HeaderMap::new();
    loop
    {
      if headers.len() >= limits.max_headers
      {
        return Err( ProxyError::HeadersTooLarge );
      }

      let line = match read_line_capped( reader, limits.max_header_line ).await
      {
        Ok( LineOutcome::Line( line ) ) => line,
        Ok( LineOutcome::Eof ) => return Err( ProxyError::ClientDisconnected ),
        Ok( LineOutcome::TooLong ) => return Err( ProxyError::HeadersTooLarge ),
        Err( _ ) => return Err( ProxyError::ClientDisconnected ),
      };

      if line.is_empty()
      {
        break;
      }

      match line.split_once( ':' )
      {
        Some( ( name, value ) ) => headers.insert( name.trim(), value.trim().to_string() ),
        None => return Err( ProxyError::MalformedRequestLine ),
      }
    }

    Ok( RequestHead { method, target, version, headers } )
  }

  /// Read and parse the backend's status line and headers, enforcing a
  /// cumulative byte budget across the whole head rather than a per-line
  /// cap, since the egress limit here is total header bytes.
  ///
  /// # Errors
  /// Returns [`ProxyError::BackendHeadersTooLarge`] if the header block
  /// exceeds `max_total`, or [`ProxyError::BackendUnreachable`] if the
  /// connection closes before a full head arrives.
  pub async fn read_response_head< R : AsyncBufRead + Unpin >( reader : &mut R, max_total : usize ) -> Result< ResponseHead >
  {
    let mut budget_used = 0usize;

    let status_line = read_budgeted_line( reader, &mut budget_used, max_total ).await?;
    let mut parts = status_line.splitn( 3, ' ' );
    let ( _version, status, reason ) = match ( parts.next(), parts.next(), parts.next() )
    {
      ( Some( v ), Some( s ), reason ) if v.starts_with( "HTTP/" ) =>
      {
        let status : u16 = s.parse().map_err( | _ | ProxyError::BackendHeadersTooLarge )?;
        ( v.to_string(), status, reason.unwrap_or( "" ).to_string() )
      }
      _ => return Err( ProxyError::BackendHeadersTooLarge ),
    };

    let mut headers = HeaderMap::new();
    loop
    {
      let line = read_budgeted_line( reader, &mut budget_used, max_total ).await?;
      if line.is_empty()
      {
        break;
      }
      match line.split_once( ':' )
      {
        Some( ( name, value ) ) => headers.insert( name.trim(), value.trim().to_string() ),
        None => return Err( ProxyError::BackendHeadersTooLarge ),
      }
    }

    Ok( ResponseHead { status, reason, headers } )
  }

  async fn read_budgeted_line< R : AsyncBufRead + Unpin >( reader : &mut R, budget_used : &mut usize, max_total : usize ) -> Result< String >
  {
    let remaining = max_total.saturating_sub( *budget_used );
    match read_line_capped( reader, remaining ).await
    {
      Ok( LineOutcome::Line( line ) ) =>
      {
        *budget_used += line.len() + 2;
        Ok( line )
      }
      Ok( LineOutcome::Eof ) => Err( ProxyError::BackendUnreachable ),
      Ok( LineOutcome::TooLong ) => Err( ProxyError::BackendHeadersTooLarge ),
      Err( _ ) => Err( ProxyError::BackendUnreachable ),
    }
  }

  /// Parse `Content-Length`/`Transfer-Encoding` into a [`crate::http_types::BodyFraming`].
  ///
  /// # Errors
  /// Returns [`ProxyError::MalformedContentLength`] if `Content-Length`
  /// is present but not a valid non-negative integer, and
  /// [`ProxyError::BodyTooLarge`] if it exceeds `max_body`.
  pub fn body_framing( headers : &HeaderMap, max_body : u64 ) -> Result< crate::http_types::BodyFraming >
  {
    use crate::http_types::BodyFraming;

    if headers.get( "transfer-encoding" ).is_some_and( | v | v.eq_ignore_ascii_case( "chunked" ) )
    {
      return Ok( BodyFraming::Chunked );
    }

    match headers.get( "content-length" )
    {
      None => Ok( BodyFraming::None ),
      Some( raw ) =>
      {
        let len : u64 = raw.trim().parse().map_err( | _ | ProxyError::MalformedContentLength )?;
        if len > max_body
        {
          return Err( ProxyError::BodyTooLarge );
        }
        Ok( BodyFraming::Fixed( len ) )
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    fn limits() -> IngressLimits
    {
      IngressLimits { max_request_line : 8192, max_headers : 64, max_header_line : 8192 }
    }

    #[ tokio::test ]
    async fn parses_simple_get()
    {
      let raw = b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
      let mut reader = BufReader::new( Cursor::new( raw ) );
      let head = read_request_head( &mut reader, &limits() ).await.expect( "should parse" );
      assert_eq!( head.method, "GET" );
      assert_eq!( head.path(), "/ping" );
      assert_eq!( head.headers.get( "host" ), Some( "x" ) );
    }

    #[ tokio::test ]
    async fn rejects_request_line_over_limit()
    {
      let long_path = "/".to_string() + &"a".repeat( 9000 );
      let raw = format!( "GET {long_path} HTTP/1.1\r\n\r\n" ).into_bytes();
      let mut reader = BufReader::new( Cursor::new( raw ) );
      let err = read_request_head( &mut reader, &limits() ).await.unwrap_err();
      assert!( matches!( err, ProxyError::RequestLineTooLong ) );
    }

    #[ tokio::test ]
    async fn accepts_exactly_8192_byte_header_line()
    {
      let value = "a".repeat( 8192 - "X-Big: ".len() );
      let raw = format!( "GET / HTTP/1.1\r\nX-Big: {value}\r\n\r\n" ).into_bytes();
      let mut reader = BufReader::new( Cursor::new( raw ) );
      let head = read_request_head( &mut reader, &limits() ).await.expect( "8192 byte line is accepted" );
      assert_eq!( head.headers.get( "x-big" ).unwrap().len(), value.len() );
    }

    #[ tokio::test ]
    async fn rejects_too_many_headers()
    {
      let mut raw = String::from( "GET / HTTP/1.1\r\n" );
      for i in 0..70
      {
        raw.push_str( &format!( "X-{i}: v\r\n" ) );
      }
      raw.push_str( "\r\n" );
      let mut reader = BufReader::new( Cursor::new( raw.into_bytes() ) );
      let err = read_request_head( &mut reader, &limits() ).await.unwrap_err();
      assert!( matches!( err, ProxyError::HeadersTooLarge ) );
    }

    #[ test ]
    fn content_length_10485760_is_accepted()
    {
      let mut headers = HeaderMap::new();
      headers.insert( "Content-Length", "10485760".to_string() );
      assert!( body_framing( &headers, 10_485_760 ).is_ok() );
    }

    #[ test ]
    fn content_length_10485761_is_rejected()
    {
      let mut headers = HeaderMap::new();
      headers.insert( "Content-Length", "10485761".to_string() );
      assert!( matches!( body_framing( &headers, 10_485_760 ), Err( ProxyError::BodyTooLarge ) ) );
    }

    #[ test ]
    fn malformed_content_length_is_rejected()
    {
      let mut headers = HeaderMap::new();
      headers.insert( "Content-Length", "not-a-number".to_string() );
      assert!( matches!( body_framing( &headers, 10_485_760 ), Err( ProxyError::MalformedContentLength ) ) );
    }
  }
}

pub use private::{ IngressLimits, body_framing, read_request_head, read_response_head };
