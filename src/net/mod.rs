pub mod fetch;

pub use fetch::{resolve_href, DefaultFetcher, FetchError, Fetcher, FileFetcher, HttpFetcher};
