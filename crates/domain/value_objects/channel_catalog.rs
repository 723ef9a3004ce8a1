use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::enums::payment_channels::PaymentChannel;

/// One payment method the storefront can offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelEntry {
    pub id: String,
    pub channel_code: String,
    pub channel_type: PaymentChannel,
    pub min_amount: i64,
    pub max_amount: i64,
    #[serde(default = "default_true")]
    pub available: bool,
    /// Some rails (Permata VA) reject the whole request when a description is sent.
    #[serde(default = "default_true")]
    pub supports_description: bool,
    #[serde(default)]
    pub requires_mobile_number: bool,
}

fn default_true() -> bool {
    true
}

impl ChannelEntry {
    fn new(
        id: &str,
        channel_code: &str,
        channel_type: PaymentChannel,
        min_amount: i64,
        max_amount: i64,
    ) -> Self {
        Self {
            id: id.to_string(),
            channel_code: channel_code.to_string(),
            channel_type,
            min_amount,
            max_amount,
            available: true,
            supports_description: true,
            requires_mobile_number: false,
        }
    }

    fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn without_description(mut self) -> Self {
        self.supports_description = false;
        self
    }

    fn with_mobile_number(mut self) -> Self {
        self.requires_mobile_number = true;
        self
    }

    pub fn accepts_amount(&self, amount: i64) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }
}

/// Result of a lenient catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub entry: ChannelEntry,
    /// False when the id was not in the catalog and a fallback entry was synthesised.
    pub from_catalog: bool,
}

/// Static registry of payment methods, loaded once at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCatalog {
    entries: Vec<ChannelEntry>,
}

impl ChannelCatalog {
    pub fn new(entries: Vec<ChannelEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entries: Vec<ChannelEntry> =
            serde_json::from_str(raw).context("invalid payment channel catalog")?;
        Ok(Self::new(entries))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read channel catalog {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Exact (case-insensitive) catalog match.
    pub fn find(&self, method_id: &str) -> Option<&ChannelEntry> {
        let method_id = method_id.trim();
        self.entries
            .iter()
            .find(|entry| entry.id.eq_ignore_ascii_case(method_id))
    }

    /// Catalog lookup that never blocks checkout: unknown ids fall back to the
    /// upper-cased id as channel code, with no amount bounds.
    pub fn lookup(&self, method_id: &str) -> ResolvedChannel {
        if let Some(entry) = self.find(method_id) {
            return ResolvedChannel {
                entry: entry.clone(),
                from_catalog: true,
            };
        }

        let normalized = method_id.trim().to_ascii_lowercase();
        let channel_type = infer_channel_type(&normalized);
        warn!(
            method_id,
            channel_type = %channel_type,
            "channel_catalog: unknown payment method, using fallback channel code"
        );

        ResolvedChannel {
            entry: ChannelEntry {
                id: normalized,
                channel_code: method_id.trim().to_ascii_uppercase(),
                channel_type,
                min_amount: 1,
                max_amount: i64::MAX,
                available: true,
                supports_description: true,
                requires_mobile_number: false,
            },
            from_catalog: false,
        }
    }

    pub fn list_activated(&self) -> Vec<ChannelEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.available)
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }
}

impl Default for ChannelCatalog {
    /// Rails offered by the storefront, amounts in IDR.
    fn default() -> Self {
        use PaymentChannel::*;

        Self::new(vec![
            ChannelEntry::new("qris", "QRIS", Qr, 1_500, 10_000_000),
            ChannelEntry::new("bca", "BCA", VirtualAccount, 10_000, 999_999_999),
            ChannelEntry::new("bni", "BNI", VirtualAccount, 10_000, 999_999_999),
            ChannelEntry::new("bri", "BRI", VirtualAccount, 10_000, 999_999_999),
            ChannelEntry::new("mandiri", "MANDIRI", VirtualAccount, 10_000, 999_999_999),
            ChannelEntry::new("permata", "PERMATA", VirtualAccount, 10_000, 999_999_999)
                .without_description(),
            ChannelEntry::new("bsi", "BSI", VirtualAccount, 10_000, 999_999_999),
            ChannelEntry::new("cimb", "CIMB", VirtualAccount, 10_000, 999_999_999).unavailable(),
            ChannelEntry::new("ovo", "OVO", Ewallet, 100, 10_000_000).with_mobile_number(),
            ChannelEntry::new("dana", "DANA", Ewallet, 100, 20_000_000),
            ChannelEntry::new("shopeepay", "SHOPEEPAY", Ewallet, 100, 20_000_000),
            ChannelEntry::new("linkaja", "LINKAJA", Ewallet, 100, 10_000_000).unavailable(),
            ChannelEntry::new("alfamart", "ALFAMART", OverTheCounter, 10_000, 5_000_000),
            ChannelEntry::new("indomaret", "INDOMARET", OverTheCounter, 10_000, 5_000_000),
            ChannelEntry::new("card", "CARDS", Card, 5_000, 200_000_000),
        ])
    }
}

fn infer_channel_type(method_id: &str) -> PaymentChannel {
    if method_id.contains("qr") {
        PaymentChannel::Qr
    } else if method_id.ends_with("_va") || method_id.starts_with("va_") {
        PaymentChannel::VirtualAccount
    } else if method_id.contains("card") {
        PaymentChannel::Card
    } else {
        PaymentChannel::Ewallet
    }
}
