//! Per-site strategies and status checkers.

pub mod anchors;
pub mod apps;
pub mod hdtime;
pub mod nodeseek;
pub mod sht;
pub mod weibo;

pub use anchors::{AnchorEndpoints, check_anchor};
pub use apps::check_app;
pub use hdtime::HdTimeSite;
pub use nodeseek::{NodeseekSite, UnreadCount};
pub use sht::ShtSite;
pub use weibo::WeiboSource;
