//! Fee schedules passed to the order protocol

use serde::Serialize;
use std::fmt;

use crate::amount::fee_to_bps;
use crate::currency::CurrencySymbol;
use crate::tenant::Organization;

/// One `recipient:bps` fee entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeEntry {
    pub recipient: String,
    pub bps: u32,
}

impl fmt::Display for FeeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.recipient, self.bps)
    }
}

/// Effective fees for one currency
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSchedule {
    pub royalty_fee: f64,
    pub royalty_fee_recipient: Option<String>,
    pub service_fee: f64,
    pub service_fee_recipient: String,
    pub savings_rate: f64,
}

impl FeeSchedule {
    /// Organization fees with the currency's overrides applied
    #[must_use]
    pub fn for_currency(organization: &Organization, symbol: CurrencySymbol) -> Self {
        let option = organization.currencies.iter().find(|c| c.symbol == symbol);
        Self {
            royalty_fee: option
                .and_then(|o| o.royalty_fee)
                .unwrap_or(organization.royalty_fee),
            royalty_fee_recipient: option
                .and_then(|o| o.royalty_fee_recipient.clone())
                .or_else(|| organization.royalty_fee_recipient.clone())
                .filter(|recipient| !recipient.is_empty()),
            service_fee: option
                .and_then(|o| o.service_fee)
                .unwrap_or(organization.service_fee),
            service_fee_recipient: option
                .and_then(|o| o.service_fee_recipient.clone())
                .unwrap_or_else(|| organization.service_fee_recipient.clone()),
            savings_rate: option
                .and_then(|o| o.savings_rate)
                .unwrap_or(organization.savings_rate),
        }
    }

    /// Royalties are computed downstream unless a recipient is configured
    #[must_use]
    pub const fn automated_royalties(&self) -> bool {
        self.royalty_fee_recipient.is_none()
    }

    /// Service fee first, then the explicit royalty if one is configured
    #[must_use]
    pub fn entries(&self) -> Vec<FeeEntry> {
        let mut entries = vec![FeeEntry {
            recipient: self.service_fee_recipient.clone(),
            bps: fee_to_bps(self.service_fee),
        }];
        if let Some(recipient) = &self.royalty_fee_recipient {
            entries.push(FeeEntry {
                recipient: recipient.clone(),
                bps: fee_to_bps(self.royalty_fee),
            });
        }
        entries
    }

    /// Entries rendered as `recipient:bps` strings
    #[must_use]
    pub fn fee_strings(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }

    /// Fee percentage shown next to the price
    ///
    /// Tenants that combine fees in the UI show royalty plus service fee.
    #[must_use]
    pub fn displayed_fee(&self, combine_fees_in_ui: bool) -> f64 {
        if combine_fees_in_ui {
            self.royalty_fee + self.service_fee
        } else {
            self.royalty_fee
        }
    }
}
