use serde::Serialize;

/// Why a product was left out of a run. Skips are expected and silent;
/// they never count as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// "From $X" variant pricing; no single comparable price exists.
    VariantPricing,
    /// Vendor lists no price at all ("contact us").
    ContactOnlyPricing,
    /// URL points at a chat community or similar, not a product page.
    NonCommerceUrl,
}

/// Outcome of one product check. The batch collects these into a
/// [`RunReport`] so the audit trail is data rather than log side effects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum CheckOutcome {
    Skipped { reason: SkipReason },
    FetchFailed { reason: String },
    /// Page fetched but no confident price found; the cached price is
    /// kept and `lastChecked` still advances.
    NoPriceFound,
    Unchanged { pct_change: f64 },
    Changed {
        old_price: f64,
        new_price: f64,
        pct_change: f64,
    },
}

/// An accepted in-memory price change, pending reconciliation back into
/// the catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub key: String,
    pub name: String,
    pub url: String,
    pub external_id: Option<String>,
    pub old_price: f64,
    pub new_price: f64,
    pub pct_change: f64,
}

/// Everything one batch run did, per product and in aggregate.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub outcomes: Vec<(String, CheckOutcome)>,
    pub changes: Vec<PriceChange>,
    pub checked: usize,
    pub skipped: usize,
    pub failed: usize,
    pub inconclusive: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub notifications_sent: usize,
    pub notifications_attempted: usize,
}

impl RunReport {
    pub fn record(&mut self, key: &str, outcome: CheckOutcome) {
        match &outcome {
            CheckOutcome::Skipped { .. } => self.skipped += 1,
            CheckOutcome::FetchFailed { .. } => {
                self.failed += 1;
                self.checked += 1;
            }
            CheckOutcome::NoPriceFound => {
                self.inconclusive += 1;
                self.checked += 1;
            }
            CheckOutcome::Unchanged { .. } => {
                self.unchanged += 1;
                self.checked += 1;
            }
            CheckOutcome::Changed { .. } => {
                self.changed += 1;
                self.checked += 1;
            }
        }
        self.outcomes.push((key.to_string(), outcome));
    }

    pub fn summary(&self) -> String {
        format!(
            "{} checked, {} skipped, {} failed, {} inconclusive, {} changed, {}/{} alerts sent",
            self.checked,
            self.skipped,
            self.failed,
            self.inconclusive,
            self.changed,
            self.notifications_sent,
            self.notifications_attempted,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_follow_outcomes() {
        let mut report = RunReport::default();
        report.record(
            "A",
            CheckOutcome::Skipped {
                reason: SkipReason::VariantPricing,
            },
        );
        report.record(
            "B",
            CheckOutcome::FetchFailed {
                reason: "timeout".into(),
            },
        );
        report.record("C", CheckOutcome::NoPriceFound);
        report.record("D", CheckOutcome::Unchanged { pct_change: 0.01 });
        report.record(
            "E",
            CheckOutcome::Changed {
                old_price: 20.0,
                new_price: 18.0,
                pct_change: 0.10,
            },
        );

        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.inconclusive, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.changed, 1);
        // skips are not checks
        assert_eq!(report.checked, 4);
        assert_eq!(report.outcomes.len(), 5);
    }
}
