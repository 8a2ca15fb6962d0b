//! Extraction of catalog records from the portal.
//!
//! A [`DetailSource`] reaches one record's detail view (through the portal's
//! JSON endpoint or a rendered browser session) and the [`Extractor`] wraps the
//! configured sources with the retry policy.

mod client;
pub mod extractor;
mod parser;
mod renderer;
pub mod types;

pub use self::types::*;

pub use self::client::{create_http_client, post, PortalApiSource};
pub use self::extractor::{DetailSource, Extractor, ItemExtractor, RetryPolicy};
pub use self::parser::{
    classify_header, parse_api_detail, parse_search_result, sanitize_control_chars,
};
pub use self::renderer::BrowserlessSource;
