//! Workflow tests for the procurement orchestrator.
//!
//! Tests: request → orchestrator → InMemoryRepository (+ ScriptedPredictor, FixedClock)
//!
//! Verifies:
//! - Constraint, vendor and budget rules decide whether an order is placed
//! - Deliveries move leg statuses and stock together, exactly once
//! - Per-SKU failures stay isolated in the batch pass
//! - Audit entries record what the automatic pipeline did and refused

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use restock_ai::{DemandEstimate, ScriptedPredictor, parse_intent};
    use restock_constraints::ConstraintViolation;
    use restock_core::SkuId;
    use restock_inventory::{Sku, VendorOffer};
    use restock_purchasing::{LegStatus, SpendPolicy, TransactionStatus};

    use crate::activity::{ActionType, ActivityFilter, Actor};
    use crate::clock::FixedClock;
    use crate::config::ProcurementConfig;
    use crate::error::{ProcurementError, Upstream};
    use crate::orchestrator::{
        BlockReason, DeliveryReadiness, IntentOutcome, OrderDecision, OrderRequest,
        ProcurementOrchestrator, SkuOutcome, SkuRef, StockVerdict,
    };
    use crate::repository::{
        FaultKind, FaultyRepository, InMemoryRepository, ProcurementRepository,
    };

    type Orchestrator =
        ProcurementOrchestrator<InMemoryRepository, ScriptedPredictor, Arc<FixedClock>>;
    type FaultyOrchestrator =
        ProcurementOrchestrator<FaultyRepository, ScriptedPredictor, Arc<FixedClock>>;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    fn setup_with(predictor: ScriptedPredictor, config: ProcurementConfig) -> (Orchestrator, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(test_time()));
        let orchestrator = ProcurementOrchestrator::with_clock(
            InMemoryRepository::new(),
            predictor,
            clock.clone(),
            config,
        );
        (orchestrator, clock)
    }

    fn setup(predictor: ScriptedPredictor) -> (Orchestrator, Arc<FixedClock>) {
        setup_with(predictor, ProcurementConfig::default())
    }

    fn faulty_setup(
        predictor: ScriptedPredictor,
        config: ProcurementConfig,
    ) -> (FaultyOrchestrator, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(test_time()));
        let orchestrator = ProcurementOrchestrator::with_clock(
            FaultyRepository::new(InMemoryRepository::new()),
            predictor,
            clock.clone(),
            config,
        );
        (orchestrator, clock)
    }

    async fn seed_sku(
        orchestrator: &Orchestrator,
        name: &str,
        units: u64,
        offers: &[(&str, Decimal, u32)],
    ) -> SkuId {
        seed_into(orchestrator.repository(), name, units, offers).await
    }

    async fn seed_into(
        repo: &InMemoryRepository,
        name: &str,
        units: u64,
        offers: &[(&str, Decimal, u32)],
    ) -> SkuId {
        let sku = Sku::register(SkuId::new(), name, units, test_time()).unwrap();
        repo.insert_sku(&sku).await.unwrap();
        for (vendor, cost, days) in offers {
            repo.add_vendor_offer(VendorOffer::new(sku.id_typed(), *vendor, *cost, *days))
                .unwrap();
        }
        sku.id_typed()
    }

    async fn stock_of(orchestrator: &Orchestrator, sku_id: SkuId) -> u64 {
        stock_in(orchestrator.repository(), sku_id).await
    }

    async fn stock_in(repo: &InMemoryRepository, sku_id: SkuId) -> u64 {
        repo.get_sku(sku_id)
            .await
            .unwrap()
            .unwrap()
            .current_units()
    }

    async fn audit(orchestrator: &Orchestrator, action: ActionType) -> Vec<crate::ActivityLogEntry> {
        orchestrator
            .activity_log(&ActivityFilter::action(action))
            .await
            .unwrap()
    }

    fn placed(decision: &OrderDecision) -> &restock_purchasing::TransactionRecord {
        decision
            .transaction()
            .unwrap_or_else(|| panic!("expected a placed order, got {decision:?}"))
    }

    #[tokio::test]
    async fn max_quantity_counts_current_stock() {
        let (orchestrator, _) = setup(ScriptedPredictor::new());
        let sku_id = seed_sku(&orchestrator, "Widget", 10, &[("Acme", dec!(1.00), 3)]).await;
        orchestrator
            .add_sku_constraint(SkuRef::Name("widget".into()), "max_quantity", "50", None)
            .await
            .unwrap();

        let accepted = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 30))
            .await
            .unwrap();
        assert_eq!(placed(&accepted).total_quantity, 30);

        let rejected = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 45))
            .await
            .unwrap();
        match rejected.block_reason() {
            Some(BlockReason::Constraint(ConstraintViolation::MaxQuantity {
                limit,
                max_orderable,
                ..
            })) => {
                assert_eq!(*limit, 50);
                assert_eq!(*max_orderable, 40);
            }
            other => panic!("expected a max_quantity block, got {other:?}"),
        }

        // Manual orders do not write constraint_violation entries.
        assert!(audit(&orchestrator, ActionType::ConstraintViolation).await.is_empty());
        assert_eq!(audit(&orchestrator, ActionType::Transaction).await.len(), 1);
    }

    #[tokio::test]
    async fn cheapest_vendor_is_selected_without_preference() {
        let (orchestrator, _) = setup(ScriptedPredictor::new());
        let sku_id = seed_sku(
            &orchestrator,
            "Widget",
            0,
            &[("A", dec!(10.00), 3), ("B", dec!(8.00), 7)],
        )
        .await;

        let decision = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 10))
            .await
            .unwrap();
        let record = placed(&decision);
        assert_eq!(record.vendors, vec!["B"]);
        assert_eq!(record.total_cost, dec!(80.00));
        assert_eq!(record.status, TransactionStatus::InTransit);
        assert_eq!(record.delivery_times, vec![7]);
        assert_eq!(
            record.expected_delivery_date,
            NaiveDate::from_ymd_opt(2025, 6, 17).unwrap()
        );
    }

    #[tokio::test]
    async fn blocked_preferred_vendor_lists_alternatives() {
        let (orchestrator, _) = setup(ScriptedPredictor::new());
        let sku_id = seed_sku(
            &orchestrator,
            "Widget",
            0,
            &[("Acme", dec!(5.00), 2), ("Globex", dec!(6.00), 4)],
        )
        .await;
        orchestrator
            .add_sku_constraint(sku_id.into(), "vendor_restriction", "acme", None)
            .await
            .unwrap();

        let decision = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 5).prefer("ACME"))
            .await
            .unwrap();
        match decision.block_reason() {
            Some(BlockReason::PreferredVendorBlocked { vendor, available }) => {
                assert_eq!(vendor, "ACME");
                assert_eq!(available, &vec!["Globex".to_string()]);
            }
            other => panic!("expected PreferredVendorBlocked, got {other:?}"),
        }
        assert!(
            orchestrator
                .repository()
                .list_active_transactions(Some(sku_id))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn legs_deliver_one_by_one_and_never_twice() {
        let predictor = ScriptedPredictor::new().estimate(
            "Widget",
            DemandEstimate::amount_only(10, "restock for two weeks")
                .with_leg("Acme", 5)
                .with_leg("Bolt", 5),
        );
        let (orchestrator, _) = setup(predictor);
        let sku_id = seed_sku(
            &orchestrator,
            "Widget",
            0,
            &[("Acme", dec!(2.00), 3), ("Bolt", dec!(2.50), 5)],
        )
        .await;

        let decision = orchestrator
            .place_order(OrderRequest::automatic(sku_id))
            .await
            .unwrap();
        let record = placed(&decision).clone();
        assert_eq!(record.vendors, vec!["Acme", "Bolt"]);
        assert_eq!(record.quantities, vec![5, 5]);

        let prediction = audit(&orchestrator, ActionType::Prediction).await;
        assert_eq!(prediction.len(), 1);
        assert_eq!(prediction[0].actor, Actor::Ai);
        assert_eq!(
            prediction[0].detail_str("reasoning"),
            Some("restock for two weeks")
        );

        let after_first = orchestrator.deliver_leg(record.id, 0).await.unwrap();
        assert_eq!(after_first.status, TransactionStatus::PartiallyDelivered);
        assert_eq!(
            after_first.vendor_statuses,
            vec![LegStatus::Delivered, LegStatus::Pending]
        );
        assert_eq!(stock_of(&orchestrator, sku_id).await, 5);

        let after_second = orchestrator.deliver_leg(record.id, 1).await.unwrap();
        assert_eq!(after_second.status, TransactionStatus::Delivered);
        assert_eq!(stock_of(&orchestrator, sku_id).await, 10);

        let again = orchestrator.deliver_leg(record.id, 0).await.unwrap_err();
        assert_eq!(again, ProcurementError::AlreadyDelivered { leg: 0 });
        assert_eq!(stock_of(&orchestrator, sku_id).await, 10);

        let out_of_range = orchestrator.deliver_leg(record.id, 7).await.unwrap_err();
        assert!(matches!(out_of_range, ProcurementError::NotFound(_)));

        let deliveries = audit(&orchestrator, ActionType::Delivery).await;
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|e| e.actor == Actor::User));
        assert_eq!(deliveries[0].detail_str("trigger"), Some("manual"));
    }

    #[tokio::test]
    async fn overselling_leaves_stock_unchanged() {
        let (orchestrator, _) = setup(ScriptedPredictor::new());
        let sku_id = seed_sku(&orchestrator, "Widget", 10, &[]).await;

        let err = orchestrator
            .sell(SkuRef::Name("Widget".into()), 20)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProcurementError::InsufficientStock {
                requested: 20,
                available: 10
            }
        );
        assert_eq!(stock_of(&orchestrator, sku_id).await, 10);

        let sold = orchestrator.sell(sku_id.into(), 4).await.unwrap();
        assert_eq!(sold.current_units(), 6);
        assert_eq!(audit(&orchestrator, ActionType::Sale).await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_delivers_only_due_transactions() {
        let (orchestrator, clock) = setup(ScriptedPredictor::new());
        let sku_id = seed_sku(&orchestrator, "Widget", 2, &[("Acme", dec!(1.00), 3)]).await;
        let decision = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 8))
            .await
            .unwrap();
        let transaction_id = placed(&decision).id;

        let early = orchestrator.process_deliveries().await.unwrap();
        assert_eq!(early.processed_count(), 0);
        assert_eq!(early.not_due, 1);
        let lines = orchestrator.check_deliveries().await.unwrap();
        assert_eq!(lines[0].readiness, DeliveryReadiness::Pending);

        clock.advance_days(3);
        let lines = orchestrator.check_deliveries().await.unwrap();
        assert_eq!(lines[0].readiness, DeliveryReadiness::Ready);

        let swept = orchestrator.process_deliveries().await.unwrap();
        assert_eq!(swept.processed_count(), 1);
        assert_eq!(swept.delivered[0].transaction_id, transaction_id);
        assert_eq!(swept.delivered[0].quantity_added, 8);
        assert_eq!(stock_of(&orchestrator, sku_id).await, 10);

        let entry = &audit(&orchestrator, ActionType::Delivery).await[0];
        assert_eq!(entry.actor, Actor::Ai);
        assert_eq!(entry.detail_str("trigger"), Some("auto"));

        let idle = orchestrator.process_deliveries().await.unwrap();
        assert_eq!(idle.processed_count(), 0);
        assert_eq!(stock_of(&orchestrator, sku_id).await, 10);
    }

    #[tokio::test]
    async fn cancelled_transactions_stop_counting_as_incoming() {
        let (orchestrator, _) = setup(ScriptedPredictor::new().estimate(
            "Widget",
            DemandEstimate::amount_only(6, "steady demand"),
        ));
        let sku_id = seed_sku(&orchestrator, "Widget", 0, &[("Acme", dec!(1.00), 3)]).await;
        let decision = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 6))
            .await
            .unwrap();
        let transaction_id = placed(&decision).id;

        let covered = orchestrator.check_stock(sku_id.into()).await.unwrap();
        assert_eq!(covered.incoming_units, 6);
        assert_eq!(covered.verdict, StockVerdict::CoveredByIncoming);

        let cancelled = orchestrator.cancel(transaction_id).await.unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert!(matches!(
            orchestrator.deliver_leg(transaction_id, 0).await,
            Err(ProcurementError::InvalidState(_))
        ));
        assert!(matches!(
            orchestrator.cancel(transaction_id).await,
            Err(ProcurementError::InvalidState(_))
        ));

        let reorder = orchestrator.check_stock(sku_id.into()).await.unwrap();
        assert_eq!(reorder.incoming_units, 0);
        assert_eq!(reorder.verdict, StockVerdict::Reorder);
        assert!(orchestrator.check_deliveries().await.unwrap().is_empty());
        assert_eq!(audit(&orchestrator, ActionType::Cancellation).await.len(), 1);
    }

    #[tokio::test]
    async fn manual_predicted_buy_nets_incoming_stock() {
        let predictor =
            ScriptedPredictor::new().estimate("Widget", DemandEstimate::amount_only(12, "trend"));
        let (orchestrator, _) = setup(predictor);
        let sku_id = seed_sku(&orchestrator, "Widget", 1, &[("Acme", dec!(1.00), 3)]).await;
        orchestrator
            .place_order(OrderRequest::explicit(sku_id, 8))
            .await
            .unwrap();

        let decision = orchestrator
            .place_order(OrderRequest::predicted("widget"))
            .await
            .unwrap();
        assert_eq!(placed(&decision).total_quantity, 4);

        // 12 more are now in flight, which covers the same estimate.
        let decision = orchestrator
            .place_order(OrderRequest::predicted("widget"))
            .await
            .unwrap();
        assert_eq!(
            decision,
            OrderDecision::NoOrderNeeded {
                sku_id,
                sku_name: "Widget".into(),
                predicted: 12,
                incoming: 12,
            }
        );
    }

    #[tokio::test]
    async fn batch_pass_shares_the_monthly_budget_and_isolates_failures() {
        let predictor = ScriptedPredictor::new()
            .estimate("Alpha", DemandEstimate::amount_only(6, "a"))
            .estimate("Beta", DemandEstimate::amount_only(6, "b"));
        let (orchestrator, _) = setup(predictor);
        seed_sku(&orchestrator, "Alpha", 0, &[("Acme", dec!(10.00), 2)]).await;
        seed_sku(&orchestrator, "Beta", 0, &[("Acme", dec!(10.00), 2)]).await;
        seed_sku(&orchestrator, "Gamma", 0, &[("Acme", dec!(10.00), 2)]).await;
        orchestrator
            .set_monthly_budget(dec!(100), None)
            .await
            .unwrap();

        let report = orchestrator.run_replenishment().await.unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.placed().count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.monthly_spent, dec!(60.00));
        assert_eq!(report.remaining_budget, Some(dec!(40.00)));

        match &report.outcomes[1] {
            SkuOutcome::Decided { decision } => match decision.block_reason() {
                Some(BlockReason::Constraint(ConstraintViolation::MonthlyBudget {
                    total_cost,
                    remaining,
                })) => {
                    assert_eq!(*total_cost, dec!(60.00));
                    assert_eq!(*remaining, dec!(40.00));
                }
                other => panic!("expected a monthly budget block, got {other:?}"),
            },
            other => panic!("expected a decision for Beta, got {other:?}"),
        }
        assert!(matches!(&report.outcomes[2], SkuOutcome::Failed { sku_name, .. } if sku_name == "Gamma"));

        let violations = audit(&orchestrator, ActionType::ConstraintViolation).await;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].sku_name.as_deref(), Some("Beta"));
        assert_eq!(violations[0].detail_str("constraint_type"), Some("monthly_budget"));
    }

    #[tokio::test]
    async fn cancelled_spend_counts_unless_configured_otherwise() {
        for (policy, expect_placed) in [
            (SpendPolicy::IncludeCancelled, false),
            (SpendPolicy::ExcludeCancelled, true),
        ] {
            let config = ProcurementConfig {
                spend_policy: policy,
                ..ProcurementConfig::default()
            };
            let (orchestrator, _) = setup_with(ScriptedPredictor::new(), config);
            let sku_id = seed_sku(&orchestrator, "Widget", 0, &[("Acme", dec!(10.00), 2)]).await;
            orchestrator.set_monthly_budget(dec!(100), None).await.unwrap();

            let first = orchestrator
                .place_order(OrderRequest::explicit(sku_id, 6))
                .await
                .unwrap();
            orchestrator.cancel(placed(&first).id).await.unwrap();

            let second = orchestrator
                .place_order(OrderRequest::explicit(sku_id, 6))
                .await
                .unwrap();
            assert_eq!(second.is_placed(), expect_placed, "policy {policy:?}");
        }
    }

    #[tokio::test]
    async fn predictor_detected_block_is_audited() {
        let predictor = ScriptedPredictor::new()
            .estimate("Widget", DemandEstimate::blocked("every vendor is restricted"));
        let (orchestrator, _) = setup(predictor);
        seed_sku(&orchestrator, "Widget", 0, &[("Acme", dec!(1.00), 1)]).await;

        let report = orchestrator.run_replenishment().await.unwrap();
        assert_eq!(report.placed().count(), 0);

        let violations = audit(&orchestrator, ActionType::ConstraintViolation).await;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].detail_str("constraint_type"), Some("ai_detected"));
        assert_eq!(
            violations[0].detail_str("violation"),
            Some("Unable to order due to constraints")
        );
        assert_eq!(
            violations[0].detail_str("reasoning"),
            Some("every vendor is restricted")
        );
    }

    #[tokio::test]
    async fn slow_predictor_fails_closed() {
        let predictor = ScriptedPredictor::new()
            .estimate("Widget", DemandEstimate::amount_only(5, "late"))
            .with_delay(Duration::from_millis(200));
        let config = ProcurementConfig {
            predictor_timeout_ms: 20,
            ..ProcurementConfig::default()
        };
        let (orchestrator, _) = setup_with(predictor, config);
        let sku_id = seed_sku(&orchestrator, "Widget", 0, &[("Acme", dec!(1.00), 1)]).await;

        match orchestrator.place_order(OrderRequest::automatic(sku_id)).await {
            Err(ProcurementError::UpstreamUnavailable { upstream, .. }) => {
                assert_eq!(upstream, Upstream::Predictor)
            }
            other => panic!("expected UpstreamUnavailable, got {other:?}"),
        }
        assert!(
            orchestrator
                .repository()
                .list_active_transactions(None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn unknown_sku_and_zero_quantity_are_errors() {
        let (orchestrator, _) = setup(ScriptedPredictor::new());
        let sku_id = seed_sku(&orchestrator, "Widget", 0, &[("Acme", dec!(1.00), 1)]).await;

        assert!(matches!(
            orchestrator.place_order(OrderRequest::explicit("Gizmo", 3)).await,
            Err(ProcurementError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.place_order(OrderRequest::explicit(sku_id, 0)).await,
            Err(ProcurementError::InvalidInput(_))
        ));
        assert!(matches!(
            orchestrator
                .add_sku_constraint(sku_id.into(), "max_quantity", "lots", None)
                .await,
            Err(ProcurementError::InvalidInput(_))
        ));
        assert!(matches!(
            orchestrator
                .add_sku_constraint(sku_id.into(), "colour", "red", None)
                .await,
            Err(ProcurementError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn chat_intents_route_to_workflows() {
        let (orchestrator, _) = setup(ScriptedPredictor::new());
        let sku_id = seed_sku(&orchestrator, "Widget", 9, &[("Acme", dec!(1.00), 1)]).await;

        let sell = parse_intent(r#"{"intent": "SELL", "sku": "widget", "quantity": 2}"#).unwrap();
        match orchestrator.handle_intent(sell).await.unwrap() {
            IntentOutcome::Sold {
                remaining_units, ..
            } => assert_eq!(remaining_units, 7),
            other => panic!("expected Sold, got {other:?}"),
        }

        let buy = parse_intent(r#"{"intent": "BUY", "sku": "Widget", "quantity": 3, "vendor": "acme"}"#)
            .unwrap();
        match orchestrator.handle_intent(buy).await.unwrap() {
            IntentOutcome::Order { decision } => {
                assert_eq!(placed(&decision).vendors, vec!["Acme"]);
            }
            other => panic!("expected Order, got {other:?}"),
        }

        let query = parse_intent(r#"{"intent": "QUERY", "response_text": "One SKU tracked."}"#)
            .unwrap();
        assert_eq!(
            orchestrator.handle_intent(query).await.unwrap(),
            IntentOutcome::Reply {
                text: "One SKU tracked.".into()
            }
        );

        let vague = parse_intent(r#"{"intent": "SELL", "sku": "Widget"}"#).unwrap();
        assert!(matches!(
            orchestrator.handle_intent(vague).await,
            Err(ProcurementError::InvalidInput(_))
        ));
        assert_eq!(stock_of(&orchestrator, sku_id).await, 7);
    }

    #[tokio::test]
    async fn global_budget_changes_are_audited() {
        let (orchestrator, _) = setup(ScriptedPredictor::new());
        orchestrator.set_monthly_budget(dec!(250.50), None).await.unwrap();
        assert!(orchestrator.clear_monthly_budget().await.unwrap());
        assert!(!orchestrator.clear_monthly_budget().await.unwrap());

        assert_eq!(audit(&orchestrator, ActionType::GlobalConstraintUpdated).await.len(), 1);
        assert_eq!(audit(&orchestrator, ActionType::GlobalConstraintDeleted).await.len(), 1);
        assert!(matches!(
            orchestrator.set_monthly_budget(dec!(-1), None).await,
            Err(ProcurementError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn failed_stock_credit_releases_the_claimed_leg() {
        let (orchestrator, _) = faulty_setup(ScriptedPredictor::new(), ProcurementConfig::default());
        let repo = orchestrator.repository();
        let sku_id = seed_into(repo.inner(), "Widget", 0, &[("Acme", dec!(1.00), 3)]).await;
        let decision = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 5))
            .await
            .unwrap();
        let transaction_id = placed(&decision).id;

        repo.inject("update_sku_stock", FaultKind::Fail);
        let err = orchestrator.deliver_leg(transaction_id, 0).await.unwrap_err();
        assert!(matches!(
            err,
            ProcurementError::UpstreamUnavailable {
                upstream: Upstream::Repository,
                ..
            }
        ));
        assert_eq!(stock_in(repo.inner(), sku_id).await, 0);
        let record = repo.inner().get_transaction(transaction_id).await.unwrap().unwrap();
        assert_eq!(record.vendor_statuses, vec![LegStatus::Pending]);
        assert_eq!(record.status, TransactionStatus::InTransit);
        assert!(
            repo.inner()
                .list_activity_log(&ActivityFilter::action(ActionType::Delivery))
                .await
                .unwrap()
                .is_empty()
        );

        // Once the store recovers the same leg can be delivered.
        repo.clear();
        let delivered = orchestrator.deliver_leg(transaction_id, 0).await.unwrap();
        assert_eq!(delivered.status, TransactionStatus::Delivered);
        assert_eq!(stock_in(repo.inner(), sku_id).await, 5);
    }

    #[tokio::test]
    async fn sweep_failure_leaves_the_transaction_due() {
        let (orchestrator, clock) =
            faulty_setup(ScriptedPredictor::new(), ProcurementConfig::default());
        let repo = orchestrator.repository();
        let sku_id = seed_into(repo.inner(), "Widget", 2, &[("Acme", dec!(1.00), 3)]).await;
        let decision = orchestrator
            .place_order(OrderRequest::explicit(sku_id, 8))
            .await
            .unwrap();
        let transaction_id = placed(&decision).id;
        clock.advance_days(3);

        repo.inject_for("update_sku_stock", sku_id, FaultKind::Fail);
        let report = orchestrator.process_deliveries().await.unwrap();
        assert_eq!(report.processed_count(), 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].transaction_id, transaction_id);
        assert!(report.failures[0].reason.contains("repository unavailable"));
        assert_eq!(stock_in(repo.inner(), sku_id).await, 2);

        let lines = orchestrator.check_deliveries().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].undelivered_units, 8);
        assert_eq!(lines[0].readiness, DeliveryReadiness::Ready);

        repo.clear();
        let report = orchestrator.process_deliveries().await.unwrap();
        assert_eq!(report.processed_count(), 1);
        assert_eq!(stock_in(repo.inner(), sku_id).await, 10);
    }

    #[tokio::test]
    async fn slow_repository_times_out_a_sale() {
        let config = ProcurementConfig {
            repository_timeout_ms: 50,
            ..ProcurementConfig::default()
        };
        let (orchestrator, _) = faulty_setup(ScriptedPredictor::new(), config);
        let repo = orchestrator.repository();
        let sku_id = seed_into(repo.inner(), "Widget", 10, &[]).await;

        repo.inject("update_sku_stock", FaultKind::Hang);
        match orchestrator.sell(sku_id.into(), 4).await {
            Err(ProcurementError::UpstreamUnavailable {
                upstream: Upstream::Repository,
                reason,
            }) => assert!(reason.contains("update_sku_stock")),
            other => panic!("expected a repository timeout, got {other:?}"),
        }
        assert_eq!(stock_in(repo.inner(), sku_id).await, 10);
        assert!(
            repo.inner()
                .list_activity_log(&ActivityFilter::action(ActionType::Sale))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn repository_failure_for_one_sku_is_isolated_in_the_batch() {
        let predictor = ScriptedPredictor::new()
            .estimate("Alpha", DemandEstimate::amount_only(6, "a"))
            .estimate("Beta", DemandEstimate::amount_only(6, "b"));
        let (orchestrator, _) = faulty_setup(predictor, ProcurementConfig::default());
        let repo = orchestrator.repository();
        let alpha = seed_into(repo.inner(), "Alpha", 0, &[("Acme", dec!(10.00), 2)]).await;
        seed_into(repo.inner(), "Beta", 0, &[("Acme", dec!(10.00), 2)]).await;

        repo.inject_for("list_sales_history", alpha, FaultKind::Fail);
        let report = orchestrator.run_replenishment().await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.placed().count(), 1);
        match &report.outcomes[0] {
            SkuOutcome::Failed {
                sku_name, error, ..
            } => {
                assert_eq!(sku_name, "Alpha");
                assert!(error.contains("repository unavailable"));
            }
            other => panic!("expected Alpha to fail, got {other:?}"),
        }
        assert!(
            repo.inner()
                .list_active_transactions(Some(alpha))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(report.monthly_spent, dec!(60.00));
    }
}
