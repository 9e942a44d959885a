//! # Seed Data Generator
//!
//! Populates a development database with a tenant's discount codes, a
//! loyalty program, an open register session and a few placed orders.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-db --bin seed
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --tenant shop-1
//! ```
//!
//! Orders go through `PosServices`, so the run also exercises the whole
//! placement flow (codes, split tender, cash change, loyalty accrual).
//!
//! Configuration is read through `AppConfig` like any other entry point.
//! `--db` and `--tenant` override `TALLY_DB_PATH` and `TALLY_TENANT_ID`;
//! without either, the tenant is `tenant-dev`.

use std::env;
use std::sync::Arc;

use tally_app::ports::LoyaltyRepository;
use tally_app::use_cases::PlaceOrderInput;
use tally_app::{init_tracing, AppConfig, ConfigError, PosServices};
use tally_core::discount::{DiscountType, NewDiscount};
use tally_core::loyalty::NewLoyaltyProgram;
use tally_core::money::Money;
use tally_core::payment::PaymentEntry;
use tally_core::types::{OrderLineInput, PaymentMethod};
use tally_db::{Database, DbConfig};

const DEFAULT_TENANT: &str = "tenant-dev";

/// `(product_id, name, unit_price, tax_rate)`
const CATALOG: &[(&str, &str, &str, &str)] = &[
    ("BEV-001", "Flat White", "4.20", "8.25"),
    ("BEV-002", "Iced Tea", "3.10", "8.25"),
    ("BAK-001", "Butter Croissant", "3.75", "0"),
    ("BAK-002", "Blueberry Muffin", "3.25", "0"),
    ("GRO-001", "Oat Milk 1L", "2.99", "5"),
];

fn line(index: usize, quantity: i64) -> Result<OrderLineInput, Box<dyn std::error::Error>> {
    let (id, name, price, tax) = CATALOG[index % CATALOG.len()];
    Ok(OrderLineInput::new(id, name, Money::parse(price)?, Money::from_int(quantity))
        .with_tax_rate(Money::parse(tax)?))
}

/// `AppConfig` from `env`, with command-line values taking precedence.
fn load_config<F>(
    db_path: Option<String>,
    tenant_id: Option<String>,
    env: F,
) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    AppConfig::from_lookup(|key| match key {
        "TALLY_DB_PATH" => db_path.clone().or_else(|| env(key)),
        "TALLY_TENANT_ID" => tenant_id
            .clone()
            .or_else(|| env(key))
            .or_else(|| Some(DEFAULT_TENANT.to_string())),
        _ => env(key),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_override: Option<String> = None;
    let mut tenant_override: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_override = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_override = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: $TALLY_DB_PATH or tally.db)");
                println!("  -t, --tenant <ID>    Tenant id (default: $TALLY_TENANT_ID or tenant-dev)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = load_config(db_override, tenant_override, |key| env::var(key).ok())?;
    init_tracing(&config.log_filter);

    let db_path = config.db_path.clone();
    let tenant_id = config.tenant_id.clone();

    println!("Tally POS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let store = Arc::new(db.store());
    println!("✓ Connected to database, migrations applied");

    if store.find_active_by_tenant(&tenant_id).await?.is_some() {
        println!("⚠ Tenant already has an active loyalty program");
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let services = PosServices::new(store.clone(), config);

    let discount = services
        .create_discount
        .execute(NewDiscount {
            tenant_id: tenant_id.clone(),
            code: "welcome10".to_string(),
            name: "Welcome 10%".to_string(),
            discount_type: DiscountType::Percentage,
            value: Money::from_int(10),
            usage_limit: Some(100),
            expires_at: None,
            is_active: true,
        })
        .await?;
    println!("✓ Discount code {}", discount.code);

    let discount = services
        .create_discount
        .execute(NewDiscount {
            tenant_id: tenant_id.clone(),
            code: "FIVEOFF".to_string(),
            name: "5 off any order".to_string(),
            discount_type: DiscountType::FixedAmount,
            value: Money::from_int(5),
            usage_limit: None,
            expires_at: None,
            is_active: true,
        })
        .await?;
    println!("✓ Discount code {}", discount.code);

    let program = services
        .create_loyalty_program
        .execute(NewLoyaltyProgram {
            tenant_id: tenant_id.clone(),
            name: "Coffee Club".to_string(),
            points_per_currency_unit: Money::from_int(1),
            redemption_rate: Money::from_int(100),
            is_active: true,
        })
        .await?;
    println!("✓ Loyalty program {}", program.name);

    let session = store.open_session(&tenant_id).await?;
    println!("✓ Session {} opened", session.id);

    let base = |customer: Option<&str>| PlaceOrderInput {
        tenant_id: tenant_id.clone(),
        session_id: session.id.clone(),
        created_by: "seed".to_string(),
        customer_id: customer.map(str::to_string),
        lines: vec![],
        discount_code: None,
        payment_method: Some(PaymentMethod::Card),
        payments: vec![],
        cash_tendered: None,
    };

    let mut coded = base(Some("cust-001"));
    coded.lines = vec![line(0, 2)?, line(2, 1)?];
    coded.discount_code = Some("WELCOME10".to_string());

    let mut split = base(Some("cust-002"));
    split.lines = vec![line(2, 1)?, line(3, 2)?];
    split.payment_method = None;
    split.payments = vec![
        PaymentEntry::new(PaymentMethod::Card, Money::from_int(5)),
        PaymentEntry::new(PaymentMethod::Cash, Money::parse("5.25")?),
    ];
    split.cash_tendered = Some(Money::from_int(10));

    let mut cash = base(None);
    cash.lines = vec![line(4, 3)?];
    cash.payment_method = Some(PaymentMethod::Cash);
    cash.cash_tendered = Some(Money::from_int(20));

    println!();
    for input in [coded, split, cash] {
        match services.place_order.execute(input).await {
            Ok(placed) => println!(
                "✓ {}  total {}  change {}",
                placed.order.order_number,
                placed.order.total.to_display(),
                placed.change.to_display()
            ),
            Err(err) => println!("✗ Order rejected: {}", err),
        }
    }

    let session = store.close_session(&session.id).await?;
    println!();
    println!("Session summary:");
    println!("{}", serde_json::to_string_pretty(&session)?);

    Ok(())
}
