//! Blocked-action notification: building the event payload is this
//! crate's concern; formatting it for Slack/Discord/etc. and delivering it
//! is a façade concern and explicitly out of scope here.

use async_trait::async_trait;

use crate::types::BlockedActionEvent;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: BlockedActionEvent);
}

/// Default sink: discards the event. Used whenever a tenant has
/// `notify_enabled = false` or no sink was configured.
#[derive(Debug, Default)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn notify(&self, _event: BlockedActionEvent) {}
}
