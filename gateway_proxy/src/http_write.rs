//! Writing an HTTP/1.1 response head, and the small fixed responses
//! (`/ping`, CORS preflight, error envelopes) built directly from a
//! [`crate::http_types::HeaderMap`].

mod private
{
  use crate::http_types::HeaderMap;
  use tokio::io::{ AsyncWrite, AsyncWriteExt };

  fn reason_phrase( status : u16 ) -> &'static str
  {
    match status
    {
      200 => "OK",
      204 => "No Content",
      400 => "Bad Request",
      401 => "Unauthorized",
      404 => "Not Found",
      413 => "Payload Too Large",
      414 => "URI Too Long",
      429 => "Too Many Requests",
      431 => "Request Header Fields Too Large",
      500 => "Internal Server Error",
      502 => "Bad Gateway",
      503 => "Service Unavailable",
      504 => "Gateway Timeout",
      _ => "Unknown",
    }
  }

  /// Write a full response (status line, headers, `Content-Length`, body)
  /// to `writer`. Always sets `Connection: close` is left to the caller;
  /// this only writes what it is given.
  pub async fn write_response< W : AsyncWrite + Unpin >
  (
    writer : &mut W,
    status : u16,
    headers : &HeaderMap,
    body : &[ u8 ],
  ) -> std::io::Result< () >
  {
    let mut out = format!( "HTTP/1.1 {} {}\r\n", status, reason_phrase( status ) );
    for ( name, value ) in headers.iter()
    {
      out.push_str( name );
      out.push_str( ": " );
      out.push_str( value );
      out.push_str( "\r\n" );
    }
    if !headers.contains( "content-length" )
    {
      out.push_str( &format!( "Content-Length: {}\r\n", body.len() ) );
    }
    out.push_str( "\r\n" );

    writer.write_all( out.as_bytes() ).await?;
    writer.write_all( body ).await?;
    writer.flush().await
  }

  /// Write a response head only (status line + headers + blank line), no
  /// body and no `Content-Length` synthesis — used by the proxy engine,
  /// which streams the body itself and has already decided framing.
  pub async fn write_head< W : AsyncWrite + Unpin >
  (
    writer : &mut W,
    status : u16,
    headers : &HeaderMap,
  ) -> std::io::Result< () >
  {
    let mut out = format!( "HTTP/1.1 {} {}\r\n", status, reason_phrase( status ) );
    for ( name, value ) in headers.iter()
    {
      out.push_str( name );
      out.push_str( ": " );
      out.push_str( value );
      out.push_str( "\r\n" );
    }
    out.push_str( "\r\n" );
    writer.write_all( out.as_bytes() ).await?;
    writer.flush().await
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ tokio::test ]
    async fn write_response_synthesizes_content_length()
    {
      let mut buf = Vec::new();
      write_response( &mut buf, 200, &HeaderMap::new(), b"hi" ).await.unwrap();
      let text = String::from_utf8( buf ).unwrap();
      assert!( text.starts_with( "HTTP/1.1 200 OK\r\n" ) );
      assert!( text.contains( "Content-Length: 2\r\n" ) );
      assert!( text.ends_with( "hi" ) );
    }
  }
}

pub use private::{ write_head, write_response };
