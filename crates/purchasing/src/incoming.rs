//! Units already in flight for a SKU.

use restock_core::SkuId;

use crate::transaction::PurchaseTransaction;

/// Sum of undelivered leg quantities on the SKU's active transactions.
///
/// Transactions that are `delivered`, `cancelled` or `completed` contribute
/// nothing, and neither do delivered legs of partially delivered ones.
pub fn incoming_units<'a>(
    transactions: impl IntoIterator<Item = &'a PurchaseTransaction>,
    sku_id: SkuId,
) -> u64 {
    transactions
        .into_iter()
        .filter(|tx| tx.sku_id() == sku_id && tx.status().is_active())
        .map(PurchaseTransaction::undelivered_units)
        .sum()
}

/// Demand left after counting what is already on the way.
pub fn effective_need(demand: u64, incoming: u64) -> u64 {
    demand.saturating_sub(incoming)
}
