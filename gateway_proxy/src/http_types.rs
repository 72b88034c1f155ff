//! Minimal HTTP/1.1 request/response head types shared by the parser and
//! the proxy engine.

mod private
{
  /// Case-insensitive header map preserving insertion order, keeping only
  /// the last value for a repeated name.
  #[ derive( Debug, Clone, Default ) ]
  pub struct HeaderMap
  {
    entries : Vec< ( String, String ) >,
  }

  impl HeaderMap
  {
    /// An empty map.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self { entries : Vec::new() }
    }

    /// Insert or overwrite `name`'s value.
    pub fn insert( &mut self, name : &str, value : String )
    {
      if let Some( entry ) = self.entries.iter_mut().find( | ( n, _ ) | n.eq_ignore_ascii_case( name ) )
      {
        entry.1 = value;
      }
      else
      {
        self.entries.push( ( name.to_string(), value ) );
      }
    }

    /// Look up a header, case-insensitively.
    #[ must_use ]
    pub fn get( &self, name : &str ) -> Option< &str >
    {
      self.entries.iter().find( | ( n, _ ) | n.eq_ignore_ascii_case( name ) ).map( | ( _, v ) | v.as_str() )
    }

    /// Whether `name` is present.
    #[ must_use ]
    pub fn contains( &self, name : &str ) -> bool
    {
      self.get( name ).is_some()
    }

    /// Remove `name`, case-insensitively; no-op if absent.
    pub fn remove( &mut self, name : &str )
    {
      self.entries.retain( | ( n, _ ) | !n.eq_ignore_ascii_case( name ) );
    }

    /// Iterate entries in insertion order.
    pub fn iter( &self ) -> impl Iterator< Item = ( &str, &str ) >
    {
      self.entries.iter().map( | ( n, v ) | ( n.as_str(), v.as_str() ) )
    }

    /// Number of headers.
    #[ must_use ]
    pub fn len( &self ) -> usize
    {
      self.entries.len()
    }

    /// Whether there are no headers.
    #[ must_use ]
    pub fn is_empty( &self ) -> bool
    {
      self.entries.is_empty()
    }
  }

  /// A parsed client request line plus headers, before any body is read.
  #[ derive( Debug, Clone ) ]
  pub struct RequestHead
  {
    /// HTTP method, upper-cased.
    pub method : String,
    /// Raw request-target, path plus query string, case preserved.
    pub target : String,
    /// HTTP version token, e.g. `HTTP/1.1`.
    pub version : String,
    /// Parsed headers.
    pub headers : HeaderMap,
  }

  impl RequestHead
  {
    /// Just the path portion of `target`, with any query string removed.
    #[ must_use ]
    pub fn path( &self ) -> &str
    {
      self.target.split( '?' ).next().unwrap_or( &self.target )
    }
  }

  /// How the body is framed, derived from `Content-Length`/
  /// `Transfer-Encoding`.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum BodyFraming
  {
    /// No body: neither header present (GET-like requests).
    None,
    /// Exactly `n` bytes follow.
    Fixed( u64 ),
    /// Chunked transfer encoding; length unknown up front.
    Chunked,
  }

  /// A parsed backend response line plus headers, before the body is
  /// streamed.
  #[ derive( Debug, Clone ) ]
  pub struct ResponseHead
  {
    /// Status code from the backend's status line.
    pub status : u16,
    /// Reason phrase from the backend's status line.
    pub reason : String,
    /// Parsed headers.
    pub headers : HeaderMap,
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn header_lookup_is_case_insensitive_and_keeps_last_value()
    {
      let mut headers = HeaderMap::new();
      headers.insert( "Content-Type", "application/json".to_string() );
      headers.insert( "content-type", "text/plain".to_string() );
      assert_eq!( headers.get( "CONTENT-TYPE" ), Some( "text/plain" ) );
      assert_eq!( headers.len(), 1 );
    }

    #[ test ]
    fn path_strips_query_string()
    {
      let head = RequestHead
      {
        method : "GET".to_string(),
        target : "/v1/models?limit=10".to_string(),
        version : "HTTP/1.1".to_string(),
        headers : HeaderMap::new(),
      };
      assert_eq!( head.path(), "/v1/models" );
    }
  }
}

pub use private::{ BodyFraming, HeaderMap, RequestHead, ResponseHead };
