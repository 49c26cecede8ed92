use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_core::{Aggregate, AggregateRoot, DomainError, Event, SkuId};

/// Aggregate root: Sku.
///
/// On-hand units only move through sales (decrement) and deliveries
/// (increment); both go through `handle`/`apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    id: SkuId,
    sku_name: String,
    current_units: u64,
    #[serde(default)]
    version: u64,
    #[serde(skip, default = "registered")]
    created: bool,
}

fn registered() -> bool {
    true
}

impl Sku {
    /// Create an empty, not-yet-registered aggregate instance.
    pub fn empty(id: SkuId) -> Self {
        Self {
            id,
            sku_name: String::new(),
            current_units: 0,
            version: 0,
            created: false,
        }
    }

    /// Register a new SKU with its opening stock.
    pub fn register(
        id: SkuId,
        name: impl Into<String>,
        initial_units: u64,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let mut sku = Self::empty(id);
        sku.execute(&SkuCommand::RegisterSku(RegisterSku {
            sku_id: id,
            name: name.into(),
            initial_units,
            occurred_at,
        }))?;
        Ok(sku)
    }

    pub fn id_typed(&self) -> SkuId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.sku_name
    }

    pub fn current_units(&self) -> u64 {
        self.current_units
    }
}

impl AggregateRoot for Sku {
    type Id = SkuId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterSku.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSku {
    pub sku_id: SkuId,
    pub name: String,
    pub initial_units: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordSale (decrements on-hand stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sku_id: SkuId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock (a delivered leg credited to on-hand stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub sku_id: SkuId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkuCommand {
    RegisterSku(RegisterSku),
    RecordSale(RecordSale),
    ReceiveStock(ReceiveStock),
}

/// Event: SkuRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuRegistered {
    pub sku_id: SkuId,
    pub name: String,
    pub initial_units: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sku_id: SkuId,
    pub quantity: u64,
    pub remaining_units: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub sku_id: SkuId,
    pub quantity: u64,
    pub on_hand_units: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkuEvent {
    SkuRegistered(SkuRegistered),
    SaleRecorded(SaleRecorded),
    StockReceived(StockReceived),
}

impl Event for SkuEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SkuEvent::SkuRegistered(_) => "inventory.sku.registered",
            SkuEvent::SaleRecorded(_) => "inventory.sku.sale_recorded",
            SkuEvent::StockReceived(_) => "inventory.sku.stock_received",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SkuEvent::SkuRegistered(e) => e.occurred_at,
            SkuEvent::SaleRecorded(e) => e.occurred_at,
            SkuEvent::StockReceived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sku {
    type Command = SkuCommand;
    type Event = SkuEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SkuEvent::SkuRegistered(e) => {
                self.id = e.sku_id;
                self.sku_name = e.name.clone();
                self.current_units = e.initial_units;
                self.created = true;
            }
            SkuEvent::SaleRecorded(e) => {
                self.current_units = e.remaining_units;
            }
            SkuEvent::StockReceived(e) => {
                self.current_units = e.on_hand_units;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SkuCommand::RegisterSku(cmd) => self.handle_register(cmd),
            SkuCommand::RecordSale(cmd) => self.handle_sale(cmd),
            SkuCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
        }
    }
}

impl Sku {
    fn ensure_sku_id(&self, sku_id: SkuId) -> Result<(), DomainError> {
        if self.id != sku_id {
            return Err(DomainError::invariant("sku_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterSku) -> Result<Vec<SkuEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sku already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("sku name cannot be empty"));
        }
        Ok(vec![SkuEvent::SkuRegistered(SkuRegistered {
            sku_id: cmd.sku_id,
            name: cmd.name.trim().to_string(),
            initial_units: cmd.initial_units,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_sale(&self, cmd: &RecordSale) -> Result<Vec<SkuEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("sku"));
        }
        self.ensure_sku_id(cmd.sku_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("sale quantity must be positive"));
        }
        if cmd.quantity > self.current_units {
            return Err(DomainError::InsufficientStock {
                requested: cmd.quantity,
                available: self.current_units,
            });
        }

        Ok(vec![SkuEvent::SaleRecorded(SaleRecorded {
            sku_id: cmd.sku_id,
            quantity: cmd.quantity,
            remaining_units: self.current_units - cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<SkuEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("sku"));
        }
        self.ensure_sku_id(cmd.sku_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("received quantity must be positive"));
        }
        let on_hand_units = self
            .current_units
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;

        Ok(vec![SkuEvent::StockReceived(StockReceived {
            sku_id: cmd.sku_id,
            quantity: cmd.quantity,
            on_hand_units,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn widget(units: u64) -> Sku {
        Sku::register(SkuId::new(), "Widget", units, test_time()).unwrap()
    }

    #[test]
    fn register_sets_name_and_opening_stock() {
        let sku = widget(10);
        assert_eq!(sku.name(), "Widget");
        assert_eq!(sku.current_units(), 10);
        assert_eq!(sku.version(), 1);
    }

    #[test]
    fn register_rejects_blank_name() {
        let err = Sku::register(SkuId::new(), "   ", 0, test_time()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("name") => {}
            _ => panic!("Expected validation error"),
        }
    }

    #[test]
    fn sale_decrements_stock() {
        let mut sku = widget(10);
        let cmd = SkuCommand::RecordSale(RecordSale {
            sku_id: sku.id_typed(),
            quantity: 4,
            occurred_at: test_time(),
        });
        let events = sku.execute(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(sku.current_units(), 6);
        assert_eq!(sku.version(), 2);
    }

    #[test]
    fn selling_more_than_on_hand_fails_and_leaves_stock() {
        let mut sku = widget(10);
        let cmd = SkuCommand::RecordSale(RecordSale {
            sku_id: sku.id_typed(),
            quantity: 20,
            occurred_at: test_time(),
        });
        let err = sku.execute(&cmd).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 20,
                available: 10
            }
        );
        assert_eq!(sku.current_units(), 10);
        assert_eq!(sku.version(), 1);
    }

    #[test]
    fn selling_exactly_on_hand_empties_stock() {
        let mut sku = widget(7);
        let cmd = SkuCommand::RecordSale(RecordSale {
            sku_id: sku.id_typed(),
            quantity: 7,
            occurred_at: test_time(),
        });
        sku.execute(&cmd).unwrap();
        assert_eq!(sku.current_units(), 0);
    }

    #[test]
    fn receive_stock_credits_units() {
        let mut sku = widget(0);
        let cmd = SkuCommand::ReceiveStock(ReceiveStock {
            sku_id: sku.id_typed(),
            quantity: 5,
            occurred_at: test_time(),
        });
        match &sku.execute(&cmd).unwrap()[0] {
            SkuEvent::StockReceived(e) => assert_eq!(e.on_hand_units, 5),
            _ => panic!("Expected StockReceived event"),
        }
        assert_eq!(sku.current_units(), 5);
    }

    #[test]
    fn commands_against_unregistered_sku_are_not_found() {
        let sku = Sku::empty(SkuId::new());
        let cmd = SkuCommand::ReceiveStock(ReceiveStock {
            sku_id: sku.id_typed(),
            quantity: 5,
            occurred_at: test_time(),
        });
        assert!(matches!(
            sku.handle(&cmd),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn deserialized_sku_is_registered() {
        let sku = widget(3);
        let json = serde_json::to_string(&sku).unwrap();
        let mut back: Sku = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sku);

        let cmd = SkuCommand::RecordSale(RecordSale {
            sku_id: back.id_typed(),
            quantity: 1,
            occurred_at: test_time(),
        });
        back.execute(&cmd).unwrap();
        assert_eq!(back.current_units(), 2);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: a sale is accepted iff it does not exceed on-hand stock.
            #[test]
            fn sale_accepted_iff_within_stock(stock in 0u64..1_000, qty in 1u64..1_500) {
                let sku = widget(stock);
                let cmd = SkuCommand::RecordSale(RecordSale {
                    sku_id: sku.id_typed(),
                    quantity: qty,
                    occurred_at: test_time(),
                });
                let result = sku.handle(&cmd);
                prop_assert_eq!(result.is_ok(), qty <= stock);
            }
        }
    }
}
