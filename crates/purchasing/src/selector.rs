//! Vendor selection for a single order leg.

use std::collections::BTreeSet;

use restock_core::DomainError;
use restock_inventory::VendorOffer;

/// Pick the vendor for a leg.
///
/// - Blocked vendors (`blocked` holds lower-cased names) are removed first;
///   nothing left is `NoVendorsAvailable`.
/// - A blocked preference is `PreferredVendorBlocked`, listing what remains.
/// - Otherwise the first remaining offer whose name contains the preference
///   (case-insensitive) wins.
/// - With no preference or no match, the cheapest offer wins; ties go to the
///   shorter lead time, then to the vendor name.
pub fn select_vendor<'a>(
    candidates: &'a [VendorOffer],
    blocked: &BTreeSet<String>,
    preferred: Option<&str>,
) -> Result<&'a VendorOffer, DomainError> {
    let available: Vec<&VendorOffer> = candidates
        .iter()
        .filter(|offer| !blocked.contains(&offer.vendor_name.trim().to_lowercase()))
        .collect();

    let Some(cheapest) = available.iter().copied().min_by(|a, b| {
        a.cost_price
            .cmp(&b.cost_price)
            .then(a.delivery_time_days.cmp(&b.delivery_time_days))
            .then_with(|| a.vendor_name.cmp(&b.vendor_name))
    }) else {
        return Err(DomainError::NoVendorsAvailable {
            blocked: blocked.iter().cloned().collect(),
        });
    };

    if let Some(preferred) = preferred.map(str::trim).filter(|p| !p.is_empty()) {
        let needle = preferred.to_lowercase();
        if blocked.contains(&needle) {
            return Err(DomainError::PreferredVendorBlocked {
                vendor: preferred.to_string(),
                available: available.iter().map(|o| o.vendor_name.clone()).collect(),
            });
        }
        if let Some(offer) = available
            .iter()
            .find(|o| o.vendor_name.to_lowercase().contains(&needle))
        {
            return Ok(*offer);
        }
        tracing::debug!(preferred, "no offer matches preferred vendor, using cheapest");
    }

    Ok(cheapest)
}
