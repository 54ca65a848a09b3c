//! Session credentials.
//!
//! Only consumption of an existing browser session is supported: cookies are
//! read from a Netscape-format export and attached to the HTTP clients.

mod cookies;

pub use cookies::{CookieError, CookieFile, CookieLine, cookie_jar, load_cookie_jar, parse_cookie_lines};
