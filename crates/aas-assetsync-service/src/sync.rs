//! Subscription synchronization.
//!
//! Subscription providers push [`NewData`] into a bounded channel. The pump
//! drains it, stores every value that differs from the stored one and
//! announces it with `ValueChange` followed by `ElementUpdate`.

use crate::context::RequestContext;
use aas_assetsync_assetconnection::NewData;
use tokio::sync::mpsc;

/// Consume pushed values until every sender is gone.
pub async fn run_subscription_pump(ctx: RequestContext, mut rx: mpsc::Receiver<NewData>) {
    while let Some(data) = rx.recv().await {
        let NewData { reference, value } = data;
        match ctx.apply_asset_value(&reference, value.clone()).await {
            Ok(Some(update)) => {
                tracing::debug!(reference = %reference, "Subscription value stored");
                ctx.publish_value_change(&reference, Some(update.old_value), value);
                ctx.publish_element_update(&reference, update.element.into());
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(reference = %reference, error = %err, "Dropping subscription value");
            }
        }
    }
    tracing::debug!("Subscription pump stopped");
}
