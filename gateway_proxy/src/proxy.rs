//! The proxy engine: connect to the backend, forward the request,
//! stream the response back, without buffering either body in full.

mod private
{
  use crate::error::ProxyError;
  use crate::http_parse::read_response_head;
  use crate::http_types::{ BodyFraming, HeaderMap, RequestHead };
  use core::time::Duration;
  use tokio::io::{ AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader };
  use tokio::net::TcpStream;

  /// Headers stripped before forwarding to the backend: hop-by-hop
  /// headers, plus `Authorization` (overwritten with the backend
  /// credential) and `Host` (reissued for the new peer).
  const STRIPPED_REQUEST_HEADERS : &[ &str ] =
    &[ "connection", "keep-alive", "te", "trailer", "transfer-encoding", "authorization", "host" ];

  /// What the caller needs after a proxy attempt completes, for metrics
  /// and the access log.
  #[ derive( Debug ) ]
  pub struct ProxyOutcome
  {
    /// The status ultimately sent to the client.
    pub status : u16,
    /// Bytes of response body streamed to the client.
    pub bytes_sent : u64,
  }

  /// Everything the engine needs to know about a single backend hop.
  #[ derive( Debug, Clone ) ]
  pub struct BackendTarget< 'a >
  {
    /// Backend host; validated loopback at config-load time.
    pub host : &'a str,
    /// Backend loopback port.
    pub port : u16,
    /// The per-process credential injected as `Authorization: Bearer`.
    pub credential : &'a str,
    /// TCP connect timeout.
    pub connect_timeout : Duration,
    /// Cap on accumulated backend response header bytes.
    pub max_response_header_total : usize,
    /// End-to-end timeout covering the whole backend interaction.
    pub request_timeout : Duration,
  }

  fn build_forward_headers( head : &RequestHead, credential : &str ) -> HeaderMap
  {
    let mut out = HeaderMap::new();
    for ( name, value ) in head.headers.iter()
    {
      if STRIPPED_REQUEST_HEADERS.iter().any( | h | name.eq_ignore_ascii_case( h ) )
      {
        continue;
      }
      out.insert( name, value.to_string() );
    }
    out.insert( "Authorization", format!( "Bearer {credential}" ) );
    out
  }

  async fn write_request_head< W : AsyncWrite + Unpin >
  ( writer : &mut W, head : &RequestHead, forward_headers : &HeaderMap ) -> std::io::Result< () >
  {
    let mut out = format!( "{} {} HTTP/1.1\r\n", head.method, head.target );
    for ( name, value ) in forward_headers.iter()
    {
      out.push_str( name );
      out.push_str( ": " );
      out.push_str( value );
      out.push_str( "\r\n" );
    }
    out.push_str( "\r\n" );
    writer.write_all( out.as_bytes() ).await
  }

  /// Copy exactly `len` bytes from `src` to `dst`, flushing after every
  /// chunk so the peer observes data promptly (needed for SSE egress and
  /// kind to the backend on ingress).
  async fn copy_exact< R, W >( src : &mut R, dst : &mut W, len : u64 ) -> std::io::Result< u64 >
  where
    R : AsyncRead + Unpin,
    W : AsyncWrite + Unpin,
  {
    use tokio::io::AsyncReadExt;
    let mut remaining = len;
    let mut buf = [ 0u8; 8192 ];
    while remaining > 0
    {
      let want = remaining.min( buf.len() as u64 ) as usize;
      let n = src.read( &mut buf[ ..want ] ).await?;
      if n == 0
      {
        break;
      }
      dst.write_all( &buf[ ..n ] ).await?;
      dst.flush().await?;
      remaining -= n as u64;
    }
    Ok( len - remaining )
  }

  /// Copy until the source reaches EOF, flushing after every chunk. Used
  /// for the backend response body when framing is unknown up front
  /// (chunked or connection-close-delimited).
  async fn copy_until_eof< R, W >( src : &mut R, dst : &mut W ) -> std::io::Result< u64 >
  where
    R : AsyncRead + Unpin,
    W : AsyncWrite + Unpin,
  {
    use tokio::io::AsyncReadExt;
    let mut total = 0u64;
    let mut buf = [ 0u8; 8192 ];
    loop
    {
      let n = src.read( &mut buf ).await?;
      if n == 0
      {
        break;
      }
      dst.write_all( &buf[ ..n ] ).await?;
      dst.flush().await?;
      total += n as u64;
    }
    Ok( total )
  }

  fn is_streaming_response( headers : &HeaderMap ) -> bool
  {
    headers.get( "content-type" ).is_some_and( | v | v.starts_with( "text/event-stream" ) )
      || headers.get( "transfer-encoding" ).is_some_and( | v | v.eq_ignore_ascii_case( "chunked" ) )
  }

  /// Proxy one request end to end: connect, forward headers and body,
  /// stream the response back through `client_writer`, and report what
  /// happened for metrics/logging.
  ///
  /// `client_body` is `None` when the request carries no body
  /// ([`BodyFraming::None`]); otherwise it is the already-buffered or
  /// still-streaming client reader positioned right after the request
  /// head.
  ///
  /// # Errors
  /// Returns a [`ProxyError`] describing the failure; the caller (the
  /// per-connection handler) is responsible for converting it into a
  /// client-visible response, since only it knows whether response bytes
  /// have already been sent.
  pub async fn proxy_request< R, W >
  (
    target : &BackendTarget< '_ >,
    head : &RequestHead,
    framing : BodyFraming,
    client_body : &mut R,
    client_writer : &mut W,
    extra_response_headers : &HeaderMap,
  ) -> Result< ProxyOutcome, ProxyError >
  where
    R : AsyncBufRead + Unpin,
    W : AsyncWrite + Unpin,
  {
    let connect_fut = TcpStream::connect( ( target.host, target.port ) );
    let stream = tokio::time::timeout( target.connect_timeout, connect_fut )
      .await
      .map_err( | _ | ProxyError::BackendUnreachable )?
      .map_err( | _ | ProxyError::BackendUnreachable )?;

    let ( backend_read, mut backend_write ) = stream.into_split();
    let mut backend_reader = BufReader::new( backend_read );

    let forward_headers = build_forward_headers( head, target.credential );

    // One deadline covers the whole backend interaction below: writing the
    // request body, reading the response head, and streaming the response
    // body back. A per-phase timeout would let a slow backend consume up to
    // three times the configured budget.
    let exchange_fut = async
    {
      write_request_head( &mut backend_write, head, &forward_headers )
        .await
        .map_err( | _ | ProxyError::BackendUnreachable )?;
      match framing
      {
        BodyFraming::None => Ok( 0u64 ),
        BodyFraming::Fixed( len ) => copy_exact( client_body, &mut backend_write, len ).await,
        BodyFraming::Chunked => copy_until_eof( client_body, &mut backend_write ).await,
      }
      .map_err( | _ | ProxyError::BackendUnreachable )?;

      let response_head = read_response_head( &mut backend_reader, target.max_response_header_total ).await?;

      let mut out_headers = response_head.headers.clone();
      out_headers.remove( "connection" );
      out_headers.remove( "keep-alive" );
      for ( name, value ) in extra_response_headers.iter()
      {
        out_headers.insert( name, value.to_string() );
      }

      crate::http_write::write_head( client_writer, response_head.status, &out_headers )
        .await
        .map_err( | _ | ProxyError::Internal )?;

      let streaming = is_streaming_response( &response_head.headers );
      let bytes_sent = if streaming
      {
        copy_until_eof( &mut backend_reader, client_writer ).await
      }
      else
      {
        match crate::http_parse::body_framing( &response_head.headers, u64::MAX )
        {
          Ok( BodyFraming::Fixed( len ) ) => copy_exact( &mut backend_reader, client_writer, len ).await,
          _ => copy_until_eof( &mut backend_reader, client_writer ).await,
        }
      }
      .map_err( | _ | ProxyError::Internal )?;

      Ok::< _, ProxyError >( ProxyOutcome { status : response_head.status, bytes_sent } )
    };

    tokio::time::timeout( target.request_timeout, exchange_fut )
      .await
      .map_err( | _ | ProxyError::BackendTimeout )?
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn forward_headers_strip_hop_by_hop_and_overwrite_auth()
    {
      let mut head = RequestHead
      {
        method : "POST".to_string(),
        target : "/v1/chat/completions".to_string(),
        version : "HTTP/1.1".to_string(),
        headers : HeaderMap::new(),
      };
      head.headers.insert( "Connection", "keep-alive".to_string() );
      head.headers.insert( "Authorization", "Bearer client-key".to_string() );
      head.headers.insert( "Content-Type", "application/json".to_string() );

      let forwarded = build_forward_headers( &head, "backend-secret" );
      assert!( !forwarded.contains( "connection" ) );
      assert_eq!( forwarded.get( "authorization" ), Some( "Bearer backend-secret" ) );
      assert_eq!( forwarded.get( "content-type" ), Some( "application/json" ) );
    }

    #[ test ]
    fn streaming_detected_by_event_stream_content_type()
    {
      let mut headers = HeaderMap::new();
      headers.insert( "Content-Type", "text/event-stream; charset=utf-8".to_string() );
      assert!( is_streaming_response( &headers ) );
    }
  }
}

pub use private::{ proxy_request, BackendTarget, ProxyOutcome };
