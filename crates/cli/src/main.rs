mod state;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;

use restock_ai::{ScriptedPredictor, parse_intent};
use restock_core::{ConstraintId, SkuId, TransactionId};
use restock_infra::{
    ActivityFilter, InMemoryRepository, OrderRequest, ProcurementConfig, ProcurementOrchestrator,
    ProcurementRepository, SkuRef,
};
use restock_inventory::{Sku, VendorOffer};
use restock_observability::LogFormat;

type Orchestrator = ProcurementOrchestrator<InMemoryRepository, ScriptedPredictor>;

#[derive(Parser)]
#[command(name = "restock", about = "Procurement decisions and purchase order lifecycle", version)]
struct Cli {
    #[arg(long, global = true, default_value = "restock-state.json", help = "Repository snapshot file")]
    state: PathBuf,
    #[arg(long, global = true, help = "Demand estimates keyed by SKU name or id")]
    estimates: Option<PathBuf>,
    #[arg(long, global = true, default_value = "json", help = "Log output: json or pretty")]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate and order every SKU as the automatic pipeline.
    Replenish,
    /// Deliver every active transaction whose expected date has arrived.
    ProcessDeliveries,
    /// List active transactions and whether they are due.
    CheckDeliveries,
    Deliver {
        #[arg(long)]
        transaction: TransactionId,
        #[arg(long)]
        leg: usize,
    },
    Buy {
        #[arg(long)]
        sku: String,
        #[arg(long, help = "Omit to order the predicted need net of incoming stock")]
        quantity: Option<u64>,
        #[arg(long)]
        vendor: Option<String>,
    },
    Sell {
        #[arg(long)]
        sku: String,
        #[arg(long)]
        quantity: u64,
    },
    Cancel {
        #[arg(long)]
        transaction: TransactionId,
    },
    CheckStock {
        #[arg(long)]
        sku: String,
    },
    /// Dispatch a chat intent given as the intent model's raw output.
    Intent { text: String },
    AddSku {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0)]
        units: u64,
    },
    AddOffer {
        #[arg(long)]
        sku: String,
        #[arg(long)]
        vendor: String,
        #[arg(long, help = "Unit cost")]
        cost: Decimal,
        #[arg(long)]
        days: u32,
    },
    AddConstraint {
        #[arg(long)]
        sku: String,
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        value: String,
        #[arg(long)]
        description: Option<String>,
    },
    RemoveConstraint {
        #[arg(long)]
        id: ConstraintId,
    },
    SetBudget {
        amount: Decimal,
        #[arg(long)]
        description: Option<String>,
    },
    ClearBudget,
    /// Audit entries, newest first.
    Activity {
        #[arg(long, help = "user or ai")]
        actor: Option<String>,
        #[arg(long, help = "e.g. delivery, constraint_violation")]
        action: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl Command {
    fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::CheckDeliveries | Self::CheckStock { .. } | Self::Activity { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    restock_observability::init(cli.log_format);

    let snapshot = state::load_snapshot(&cli.state)?;
    let repository =
        InMemoryRepository::from_snapshot(snapshot).context("state file is inconsistent")?;
    let predictor = state::load_predictor(cli.estimates.as_deref())?;
    let orchestrator = ProcurementOrchestrator::new(repository, predictor, ProcurementConfig::from_env());

    let read_only = cli.command.is_read_only();
    run(&orchestrator, cli.command).await?;

    if !read_only {
        let snapshot = orchestrator
            .repository()
            .snapshot()
            .context("failed to capture state")?;
        state::save_snapshot(&cli.state, &snapshot)?;
    }
    Ok(())
}

async fn run(orchestrator: &Orchestrator, command: Command) -> Result<()> {
    match command {
        Command::Replenish => print_json(&orchestrator.run_replenishment().await?),
        Command::ProcessDeliveries => print_json(&orchestrator.process_deliveries().await?),
        Command::CheckDeliveries => print_json(&orchestrator.check_deliveries().await?),
        Command::Deliver { transaction, leg } => {
            print_json(&orchestrator.deliver_leg(transaction, leg).await?)
        }
        Command::Buy {
            sku,
            quantity,
            vendor,
        } => {
            let sku = sku_ref(&sku);
            let mut request = match quantity {
                Some(quantity) => OrderRequest::explicit(sku, quantity),
                None => OrderRequest::predicted(sku),
            };
            request.preferred_vendor = vendor;
            print_json(&orchestrator.place_order(request).await?)
        }
        Command::Sell { sku, quantity } => {
            print_json(&orchestrator.sell(sku_ref(&sku), quantity).await?)
        }
        Command::Cancel { transaction } => print_json(&orchestrator.cancel(transaction).await?),
        Command::CheckStock { sku } => print_json(&orchestrator.check_stock(sku_ref(&sku)).await?),
        Command::Intent { text } => {
            let intent = parse_intent(&text).context("could not read intent")?;
            print_json(&orchestrator.handle_intent(intent).await?)
        }
        Command::AddSku { name, units } => {
            let sku = Sku::register(SkuId::new(), name, units, Utc::now())?;
            orchestrator.repository().insert_sku(&sku).await?;
            tracing::info!(sku = %sku.id_typed(), name = sku.name(), "sku added");
            print_json(&sku)
        }
        Command::AddOffer {
            sku,
            vendor,
            cost,
            days,
        } => {
            let sku = find_sku(orchestrator, &sku).await?;
            let offer = VendorOffer::new(sku.id_typed(), vendor, cost, days);
            orchestrator.repository().add_vendor_offer(offer.clone())?;
            print_json(&offer)
        }
        Command::AddConstraint {
            sku,
            kind,
            value,
            description,
        } => print_json(
            &orchestrator
                .add_sku_constraint(sku_ref(&sku), &kind, &value, description)
                .await?,
        ),
        Command::RemoveConstraint { id } => {
            let removed = orchestrator.remove_sku_constraint(id).await?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Command::SetBudget {
            amount,
            description,
        } => print_json(&orchestrator.set_monthly_budget(amount, description).await?),
        Command::ClearBudget => {
            let removed = orchestrator.clear_monthly_budget().await?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Command::Activity {
            actor,
            action,
            limit,
        } => {
            let filter = ActivityFilter {
                actor: actor.as_deref().map(parse_label).transpose()?,
                action_type: action.as_deref().map(parse_label).transpose()?,
                limit,
            };
            print_json(&orchestrator.activity_log(&filter).await?)
        }
    }
}

/// An id if it parses as one, otherwise a name.
fn sku_ref(raw: &str) -> SkuRef {
    raw.parse::<SkuId>()
        .map(SkuRef::Id)
        .unwrap_or_else(|_| SkuRef::Name(raw.trim().to_string()))
}

async fn find_sku(orchestrator: &Orchestrator, raw: &str) -> Result<Sku> {
    let repository = orchestrator.repository();
    let found = match sku_ref(raw) {
        SkuRef::Id(id) => repository.get_sku(id).await?,
        SkuRef::Name(name) => repository.find_sku_by_name(&name).await?,
    };
    found.ok_or_else(|| anyhow!("sku '{raw}' not found"))
}

/// Snake-case enum labels, as they appear in the JSON output.
fn parse_label<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
        .with_context(|| format!("unknown value '{raw}'"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use restock_infra::{ActionType, Actor};

    #[test]
    fn sku_arguments_accept_ids_and_names() {
        let id = SkuId::new();
        assert_eq!(sku_ref(&id.to_string()), SkuRef::Id(id));
        assert_eq!(sku_ref(" Widget "), SkuRef::Name("Widget".into()));
    }

    #[test]
    fn activity_filters_parse_from_labels() {
        assert_eq!(parse_label::<Actor>("AI").unwrap(), Actor::Ai);
        assert_eq!(
            parse_label::<ActionType>("constraint_violation").unwrap(),
            ActionType::ConstraintViolation
        );
        assert!(parse_label::<ActionType>("refund").is_err());
    }

    #[test]
    fn command_line_parses() {
        let cli = Cli::try_parse_from([
            "restock",
            "--state",
            "s.json",
            "buy",
            "--sku",
            "Widget",
            "--quantity",
            "5",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Buy {
                quantity: Some(5),
                ..
            }
        ));
        assert!(!cli.command.is_read_only());

        let cli = Cli::try_parse_from(["restock", "activity", "--limit", "3"]).unwrap();
        assert!(cli.command.is_read_only());
        assert_eq!(cli.state, PathBuf::from("restock-state.json"));
    }

    #[test]
    fn remove_constraint_takes_a_constraint_id() {
        let id = ConstraintId::new();
        let cli =
            Cli::try_parse_from(["restock", "remove-constraint", "--id", &id.to_string()]).unwrap();
        assert!(matches!(cli.command, Command::RemoveConstraint { id: parsed } if parsed == id));
        assert!(!cli.command.is_read_only());

        assert!(Cli::try_parse_from(["restock", "remove-constraint", "--id", "nope"]).is_err());
    }

    #[tokio::test]
    async fn removing_a_constraint_reports_whether_it_existed() {
        let orchestrator = ProcurementOrchestrator::new(
            InMemoryRepository::new(),
            ScriptedPredictor::new(),
            ProcurementConfig::default(),
        );
        run(
            &orchestrator,
            Command::AddSku {
                name: "Widget".into(),
                units: 3,
            },
        )
        .await
        .unwrap();
        let stored = orchestrator
            .add_sku_constraint(SkuRef::Name("Widget".into()), "max_quantity", "50", None)
            .await
            .unwrap();

        run(&orchestrator, Command::RemoveConstraint { id: stored.id })
            .await
            .unwrap();
        let sku = find_sku(&orchestrator, "Widget").await.unwrap();
        assert!(
            orchestrator
                .repository()
                .list_constraints(sku.id_typed())
                .await
                .unwrap()
                .is_empty()
        );
        assert!(!orchestrator.remove_sku_constraint(stored.id).await.unwrap());
    }
}
