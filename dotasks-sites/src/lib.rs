//! # dotasks-sites
//!
//! Site clients for dotasks: the HTTP layer, token extraction, the sign-in
//! and gallery strategy traits, the concrete sites, and the incremental
//! gallery crawl.
//!
//! ## Design
//!
//! - One [`HttpClient`] per process with a cookie jar seeded from the
//!   user's configuration; requests never retry on their own
//! - Every sign-in site implements [`SignInStrategy`]; the caller owns the
//!   state machine and the persisted progress, this crate owns the requests
//!   and the parsing
//! - Gallery platforms implement [`GallerySource`] and are driven by
//!   [`crawl::crawl`], which handles cursors, retries and politeness delays
//! - No persistence: cursors come in as arguments and go out in results

pub mod config;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod http;
pub mod site;
pub mod sites;
pub mod types;

pub use config::{ClientConfig, CrawlConfig};
pub use crawl::{CrawlOutcome, CrawlStatus, compare_ids, crawl};
pub use error::{Result, SiteError};
pub use http::{Credentials, HttpClient, RequestBody, RequestOptions, ResponseHandle};
pub use site::{GalleryEntry, GalleryPage, GallerySource, SignInStrategy};
pub use types::{
    Album, AnchorPlatform, AnchorStatus, AppPlatform, AppStatus, ChallengeAnswer, GalleryPlatform,
    ReplyToken, SignForm, SignInSite, SiteStatus, SubmitOutcome,
};
