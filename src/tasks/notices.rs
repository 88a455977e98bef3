//! Nodeseek unread-notification check.

use super::TaskServices;
use crate::error::Result;
use crate::notify::Notification;

const TAG: &str = "[nodeseek]";

/// Check the unread counter once and announce unread notifications.
///
/// Returns the unread count. A failed check is notified and returned.
///
/// # Errors
///
/// Returns the site error when the counter could not be read.
pub async fn check_notices(services: &TaskServices) -> Result<u64> {
    let site = services.nodeseek();
    let unread = match site.unread_count(&services.http).await {
        Ok(unread) => unread,
        Err(e) => {
            tracing::warn!("{TAG} unread check failed: {e}");
            services.notify(
                Notification::new(format!("{TAG} 检查通知失败"), e.to_string()).with_icon("nodeseek"),
            );
            return Err(e.into());
        }
    };

    if unread.all == 0 {
        tracing::debug!("{TAG} no unread notifications");
        return Ok(0);
    }

    tracing::info!(all = unread.all, at_me = unread.at_me, reply = unread.reply, "{TAG} unread notifications");
    services.notify(
        Notification::new(format!("{TAG} 有新通知"), format!("有 {} 条新通知", unread.all))
            .with_icon("nodeseek")
            .with_action("打开网页", Some(site.notification_url(&unread))),
    );
    Ok(unread.all)
}
