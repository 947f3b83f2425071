use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{prelude::Subscriptions, subscriptions};
use crate::models::product::{format_price_display, WorklistEntry};
use crate::scrapers::SourceKind;
use crate::services::email::{EmailDelivery, EmailMessage};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotifyStats {
    pub sent: usize,
    pub attempted: usize,
}

/// Fan-out of price-drop alerts to matching subscribers.
///
/// Both collaborators are optional: with no subscription store or no
/// delivery credential the whole step degrades to a warned no-op, and
/// price checking proceeds as if nobody was subscribed.
pub struct Notifier {
    db: Option<DatabaseConnection>,
    email: Option<Arc<dyn EmailDelivery>>,
    from_address: String,
    site_base_url: String,
    affiliate_tag: Option<String>,
}

impl Notifier {
    pub fn new(
        db: Option<DatabaseConnection>,
        email: Option<Arc<dyn EmailDelivery>>,
        from_address: String,
        site_base_url: String,
        affiliate_tag: Option<String>,
    ) -> Self {
        Self {
            db,
            email,
            from_address,
            site_base_url,
            affiliate_tag,
        }
    }

    /// A notifier that never sends; used when alerts are not configured.
    pub fn disabled() -> Self {
        Self::new(None, None, String::new(), String::new(), None)
    }

    /// Notify every active subscriber of `entry` whose threshold (in
    /// percentage points) is at or below the observed drop. Called only
    /// for confirmed decreases. Zero matches is a normal outcome.
    pub async fn notify_price_drop(
        &self,
        entry: &WorklistEntry,
        old_price: f64,
        new_price: f64,
        drop_pct: f64,
    ) -> NotifyStats {
        let mut stats = NotifyStats::default();

        let (Some(db), Some(email)) = (&self.db, &self.email) else {
            tracing::warn!(
                "Alerts not configured, skipping notifications for {}",
                entry.name
            );
            return stats;
        };

        let drop_points = drop_pct * 100.0;

        let subscribers = match Subscriptions::find()
            .filter(subscriptions::Column::ProductKey.eq(&entry.key))
            .filter(subscriptions::Column::Active.eq(true))
            .filter(subscriptions::Column::ThresholdPct.lte(drop_points))
            .all(db)
            .await
        {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::error!("Subscription lookup failed for {}: {}", entry.key, e);
                return stats;
            }
        };

        if subscribers.is_empty() {
            tracing::debug!("No subscribers for {} at a {:.1}% drop", entry.key, drop_points);
            return stats;
        }

        for subscriber in subscribers {
            stats.attempted += 1;
            let message = self.render(entry, old_price, new_price, drop_points, &subscriber);

            match email.send(&message).await {
                Ok(()) => {
                    stats.sent += 1;
                    // Single atomic statement; never a transaction held
                    // across the send above.
                    let stamp = Subscriptions::update_many()
                        .col_expr(
                            subscriptions::Column::LastNotifiedAt,
                            Expr::value(Utc::now().naive_utc()),
                        )
                        .filter(subscriptions::Column::Id.eq(subscriber.id))
                        .exec(db)
                        .await;
                    if let Err(e) = stamp {
                        tracing::error!(
                            "Failed to stamp last_notified_at for subscription {}: {}",
                            subscriber.id,
                            e
                        );
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to send alert to {}: {}", subscriber.email, e);
                }
            }
        }

        tracing::info!(
            "{}: alerted {}/{} subscribers of a {:.1}% drop",
            entry.name,
            stats.sent,
            stats.attempted,
            drop_points
        );
        stats
    }

    fn render(
        &self,
        entry: &WorklistEntry,
        old_price: f64,
        new_price: f64,
        drop_points: f64,
        subscriber: &subscriptions::Model,
    ) -> EmailMessage {
        let buy_url = self.purchase_url(entry);
        let unsubscribe_url = format!(
            "{}/api/alerts/unsubscribe?token={}",
            self.site_base_url.trim_end_matches('/'),
            subscriber.unsubscribe_token
        );

        let html = format!(
            "<h2>Price drop: {name}</h2>\
             <p>{name} dropped from <s>{old}</s> to <strong>{new}</strong> \
             &mdash; you save {pct:.0}%.</p>\
             <p><a href=\"{buy}\">View the deal</a></p>\
             <p style=\"font-size:12px;color:#888\">\
             <a href=\"{unsub}\">Unsubscribe from this alert</a></p>",
            name = entry.name,
            old = format_price_display(old_price),
            new = format_price_display(new_price),
            pct = drop_points,
            buy = buy_url,
            unsub = unsubscribe_url,
        );

        EmailMessage {
            from: self.from_address.clone(),
            to: subscriber.email.clone(),
            subject: format!(
                "Price drop: {} is now {}",
                entry.name,
                format_price_display(new_price)
            ),
            html,
        }
    }

    /// Purchase link with the site's affiliate attribution on marketplace
    /// URLs that do not already carry one.
    fn purchase_url(&self, entry: &WorklistEntry) -> String {
        match &self.affiliate_tag {
            Some(tag) if entry.source == SourceKind::Amazon && !entry.url.contains("tag=") => {
                let sep = if entry.url.contains('?') { '&' } else { '?' };
                format!("{}{}tag={}", entry.url, sep, tag)
            }
            _ => entry.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Mutex;

    struct FakeEmail {
        sent: Mutex<Vec<EmailMessage>>,
        fail_for: Option<String>,
    }

    impl FakeEmail {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: None,
            }
        }

        fn failing_for(address: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: Some(address.to_string()),
            }
        }
    }

    #[async_trait::async_trait]
    impl EmailDelivery for FakeEmail {
        async fn send(
            &self,
            message: &EmailMessage,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail_for.as_deref() == Some(message.to.as_str()) {
                return Err("delivery rejected".into());
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn subscriber(id: i32, email: &str, threshold_pct: f64) -> subscriptions::Model {
        subscriptions::Model {
            id,
            product_key: "X1".to_string(),
            email: email.to_string(),
            threshold_pct,
            active: true,
            unsubscribe_token: format!("tok-{id}"),
            created_at: None,
            last_notified_at: None,
        }
    }

    fn entry() -> WorklistEntry {
        WorklistEntry {
            key: "X1".to_string(),
            name: "Widget".to_string(),
            url: "https://www.amazon.com/dp/B0ABCD1234".to_string(),
            source: SourceKind::Amazon,
            external_id: Some("X1".to_string()),
            price: 18.0,
            price_display: "$18.00".to_string(),
            last_checked: None,
            last_changed: None,
        }
    }

    #[tokio::test]
    async fn test_notifies_each_matching_subscriber_once() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![subscriber(1, "a@example.com", 5.0)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let email = Arc::new(FakeEmail::new());

        let notifier = Notifier::new(
            Some(db),
            Some(email.clone()),
            "alerts@meshparts.example".to_string(),
            "https://meshparts.example".to_string(),
            Some("meshparts-20".to_string()),
        );

        let stats = notifier.notify_price_drop(&entry(), 20.0, 18.0, 0.10).await;
        assert_eq!(stats, NotifyStats { sent: 1, attempted: 1 });

        let sent = email.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@example.com");
        assert!(sent[0].subject.contains("$18.00"));
        assert!(sent[0].html.contains("$20.00"));
        assert!(sent[0].html.contains("10%"));
        assert!(sent[0].html.contains("token=tok-1"));
        assert!(sent[0].html.contains("tag=meshparts-20"));
    }

    #[tokio::test]
    async fn test_one_failed_delivery_does_not_block_others() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![
                subscriber(1, "bounce@example.com", 5.0),
                subscriber(2, "ok@example.com", 5.0),
            ]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let email = Arc::new(FakeEmail::failing_for("bounce@example.com"));

        let notifier = Notifier::new(
            Some(db),
            Some(email.clone()),
            "alerts@meshparts.example".to_string(),
            "https://meshparts.example".to_string(),
            None,
        );

        let stats = notifier.notify_price_drop(&entry(), 20.0, 18.0, 0.10).await;
        assert_eq!(stats, NotifyStats { sent: 1, attempted: 2 });
        assert_eq!(email.sent.lock().unwrap()[0].to, "ok@example.com");
    }

    #[tokio::test]
    async fn test_unconfigured_notifier_is_a_noop() {
        let stats = Notifier::disabled()
            .notify_price_drop(&entry(), 20.0, 18.0, 0.10)
            .await;
        assert_eq!(stats, NotifyStats { sent: 0, attempted: 0 });
    }

    #[tokio::test]
    async fn test_zero_matching_subscribers_is_normal() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<subscriptions::Model>::new()])
            .into_connection();

        let notifier = Notifier::new(
            Some(db),
            Some(Arc::new(FakeEmail::new())),
            "alerts@meshparts.example".to_string(),
            "https://meshparts.example".to_string(),
            None,
        );

        let stats = notifier.notify_price_drop(&entry(), 20.0, 18.0, 0.10).await;
        assert_eq!(stats, NotifyStats { sent: 0, attempted: 0 });
    }

    #[test]
    fn test_affiliate_tag_only_on_marketplace_urls() {
        let notifier = Notifier::new(
            None,
            None,
            String::new(),
            String::new(),
            Some("meshparts-20".to_string()),
        );

        assert_eq!(
            notifier.purchase_url(&entry()),
            "https://www.amazon.com/dp/B0ABCD1234?tag=meshparts-20"
        );

        let mut shopify = entry();
        shopify.url = "https://store.rakwireless.com/products/rak19007".to_string();
        shopify.source = SourceKind::Shopify;
        assert_eq!(notifier.purchase_url(&shopify), shopify.url);

        let mut tagged = entry();
        tagged.url = "https://www.amazon.com/dp/B0ABCD1234?tag=other-21".to_string();
        assert_eq!(notifier.purchase_url(&tagged), tagged.url);
    }
}
