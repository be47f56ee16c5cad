//! Command line interface - argument parsing and output.
//!
//! Each subcommand parses its arguments, calls into [`crate::core`] and prints the result.
//! No ledger logic lives here.

pub mod format;

use crate::{
    config::app::AppConfig,
    core::{
        consumption, giveaway, ledger,
        ledger::DateWindow,
        local_now,
        product::{self, Category},
        purchase, reconcile,
        reconcile::temporal::parse_datetime_text,
        settings::{self, Settings, SettingsUpdate, SharePreferences},
        share,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use format::{
    budget_used_percent, format_amount, format_days_remaining, format_heatmap,
    format_progress_bar, format_quantity,
};
use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use tracing::info;

/// Personal consumable inventory ledger
#[derive(Parser, Debug)]
#[command(name = "smoke-ledger", version)]
#[command(about = "Track purchases, consumption and giveaways; import and export spreadsheets")]
pub struct Cli {
    /// Database connection string (also read from `DATABASE_URL`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Path to the TOML configuration file
    #[arg(long, default_value = crate::config::app::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Act as this user instead of the configured one
    #[arg(long)]
    pub user: Option<String>,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Budget and consumption overview
    Dashboard(WindowArgs),
    /// Stock, cost and supply estimate per product
    Inventory,
    /// Cost attribution and activity
    Analytics(WindowArgs),
    /// Consumption and giveaway log
    History(WindowArgs),
    /// Manage products
    Product(ProductArgs),
    /// Record a purchase
    Purchase(PurchaseArgs),
    /// Log consumption
    Consume(ConsumeArgs),
    /// Correct a consumption entry
    EditEntry(EditEntryArgs),
    /// Delete a consumption entry
    DeleteEntry(IdArgs),
    /// Give stock away
    Give(GiveArgs),
    /// Change the monthly budget or currency
    Settings(SettingsArgs),
    /// Import a workbook (JSON file or directory of CSV sheets)
    Import(PathArgs),
    /// Export the ledger (`.json` file, otherwise a directory of CSV sheets)
    Export(PathArgs),
    /// Manage the public share link
    Share(ShareArgs),
}

/// A date window option.
#[derive(Args, Debug)]
pub struct WindowArgs {
    /// today, week, month or all
    #[arg(long, default_value = "month", value_parser = parse_window)]
    pub window: DateWindow,
}

/// A single id.
#[derive(Args, Debug)]
pub struct IdArgs {
    /// Row id
    pub id: i64,
}

/// A filesystem path.
#[derive(Args, Debug)]
pub struct PathArgs {
    /// Workbook location
    pub path: PathBuf,
}

/// Product subcommands.
#[derive(Args, Debug)]
pub struct ProductArgs {
    /// What to do with products
    #[command(subcommand)]
    pub command: ProductCommand,
}

/// Product management.
#[derive(Subcommand, Debug)]
pub enum ProductCommand {
    /// Add a product
    Add {
        /// Display name
        name: String,
        /// Cigar, Cigarillo, Cigarette, Snus or Other
        #[arg(long, default_value = "Other", value_parser = parse_category)]
        category: Category,
        /// Flavor or other detail
        #[arg(long)]
        detail: Option<String>,
    },
    /// List products
    List,
    /// Rename or recategorise a product
    Edit {
        /// Product id
        id: i64,
        /// New display name
        name: String,
        /// New category
        #[arg(long, default_value = "Other", value_parser = parse_category)]
        category: Category,
        /// New detail
        #[arg(long)]
        detail: Option<String>,
    },
    /// Delete a product and all of its history
    Delete(IdArgs),
}

/// Arguments of `purchase`.
#[derive(Args, Debug)]
pub struct PurchaseArgs {
    /// Product name
    pub product: String,
    /// Whole units bought
    pub quantity: i32,
    /// Price per unit
    pub unit_price: f64,
    /// When, defaults to now
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<NaiveDateTime>,
}

/// Arguments of `consume`.
#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Product name
    pub product: String,
    /// Units consumed, fractions allowed
    #[arg(default_value_t = 1.0)]
    pub quantity: f64,
    /// When, defaults to now
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<NaiveDateTime>,
}

/// Arguments of `edit-entry`.
#[derive(Args, Debug)]
pub struct EditEntryArgs {
    /// Consumption entry id
    pub id: i64,
    /// Product name
    pub product: String,
    /// Units consumed
    pub quantity: f64,
    /// When, defaults to now
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<NaiveDateTime>,
}

/// Arguments of `give`.
#[derive(Args, Debug)]
pub struct GiveArgs {
    /// Product name
    pub product: String,
    /// Units given away
    pub quantity: f64,
    /// Who received it
    #[arg(long)]
    pub to: Option<String>,
    /// Free-text notes
    #[arg(long)]
    pub notes: Option<String>,
    /// When, defaults to now
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<NaiveDateTime>,
}

/// Arguments of `settings`.
#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// New monthly budget
    #[arg(long)]
    pub budget: Option<f64>,
    /// New currency tag
    #[arg(long)]
    pub currency: Option<String>,
}

/// Share subcommands.
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// What to do with the share link
    #[command(subcommand)]
    pub command: ShareCommand,
}

/// Share link management.
#[derive(Subcommand, Debug)]
pub enum ShareCommand {
    /// Issue a new token, invalidating the old one
    Create,
    /// Turn sharing off
    Revoke,
    /// Choose the visible sections
    Prefs {
        /// Show the dashboard
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        dashboard: bool,
        /// Show consumption and giveaway history
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        history: bool,
        /// Show the inventory
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        inventory: bool,
        /// Show the purchase log
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        purchases: bool,
    },
    /// Print what a token exposes, as JSON
    Show {
        /// Share token
        token: String,
    },
}

fn parse_window(raw: &str) -> std::result::Result<DateWindow, String> {
    raw.parse().map_err(|e: Error| e.to_string())
}

fn parse_category(raw: &str) -> std::result::Result<Category, String> {
    raw.parse().map_err(|e: Error| e.to_string())
}

fn parse_timestamp(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_datetime_text(raw).ok_or_else(|| format!("unreadable date/time: {raw}"))
}

/// Everything a command needs.
struct Context<'a> {
    db: &'a DatabaseConnection,
    config: &'a AppConfig,
    user_id: &'a str,
}

impl Context<'_> {
    async fn settings(&self) -> Result<Settings> {
        let fallback = Settings {
            monthly_budget: self.config.default_monthly_budget,
            currency: self.config.default_currency.clone(),
            ..Settings::default()
        };
        settings::get_settings_or(self.db, self.user_id, fallback).await
    }

    async fn product_id(&self, name: &str) -> Result<i64> {
        product::get_product_by_name(self.db, self.user_id, name)
            .await?
            .map(|p| p.id)
            .ok_or_else(|| Error::ProductNotFound {
                name: name.to_string(),
            })
    }
}

/// Runs a parsed command line.
pub async fn run(cli: Cli, config: &AppConfig, db: &DatabaseConnection) -> Result<()> {
    let user_id = cli.user.as_deref().unwrap_or(&config.user_id);
    let ctx = Context {
        db,
        config,
        user_id,
    };
    info!("Running {:?} for {}", cli.command, user_id);

    match cli.command {
        Command::Dashboard(args) => dashboard(&ctx, args.window).await,
        Command::Inventory => inventory(&ctx).await,
        Command::Analytics(args) => analytics(&ctx, args.window).await,
        Command::History(args) => history(&ctx, args.window).await,
        Command::Product(args) => product_command(&ctx, args.command).await,
        Command::Purchase(args) => {
            let product_id = ctx.product_id(&args.product).await?;
            let created = purchase::create_purchase(
                db,
                user_id,
                product_id,
                args.at.unwrap_or_else(local_now),
                args.quantity,
                args.unit_price,
            )
            .await?;
            let settings = ctx.settings().await?;
            println!(
                "Purchased {} x {} for {}",
                created.quantity,
                args.product,
                format_amount(created.total_cost, &settings.currency)
            );
            Ok(())
        }
        Command::Consume(args) => {
            let product_id = ctx.product_id(&args.product).await?;
            let entry = consumption::create_consumption(
                db,
                user_id,
                product_id,
                args.at.unwrap_or_else(local_now),
                args.quantity,
            )
            .await?;
            println!(
                "Logged {} of {} (entry {})",
                format_quantity(entry.quantity),
                args.product,
                entry.id
            );
            Ok(())
        }
        Command::EditEntry(args) => {
            let product_id = ctx.product_id(&args.product).await?;
            let entry = consumption::update_consumption(
                db,
                user_id,
                args.id,
                product_id,
                args.at.unwrap_or_else(local_now),
                args.quantity,
            )
            .await?;
            println!("Updated entry {}", entry.id);
            Ok(())
        }
        Command::DeleteEntry(args) => {
            consumption::delete_consumption(db, user_id, args.id).await?;
            println!("Deleted entry {}", args.id);
            Ok(())
        }
        Command::Give(args) => {
            let product_id = ctx.product_id(&args.product).await?;
            let given = giveaway::create_giveaway(
                db,
                user_id,
                product_id,
                args.quantity,
                args.at.unwrap_or_else(local_now),
                args.to,
                args.notes,
            )
            .await?;
            println!(
                "Gave away {} of {}",
                format_quantity(given.quantity),
                args.product
            );
            Ok(())
        }
        Command::Settings(args) => {
            let saved = settings::upsert_settings(
                db,
                user_id,
                SettingsUpdate {
                    monthly_budget: args.budget,
                    currency: args.currency,
                },
            )
            .await?;
            println!(
                "Monthly budget: {}",
                format_amount(saved.monthly_budget, &saved.currency)
            );
            Ok(())
        }
        Command::Import(args) => {
            let report = reconcile::import_path(db, user_id, &args.path).await?;
            println!(
                "Imported {} purchases and {} consumption entries, created {} products",
                report.purchases_imported, report.consumption_imported, report.products_created
            );
            println!(
                "Skipped {} duplicates, {} rows without a product, {} invalid rows",
                report.duplicates_skipped, report.unresolved_product, report.invalid_rows
            );
            if report.budget_updated {
                println!("Monthly budget updated from the workbook");
            }
            Ok(())
        }
        Command::Export(args) => {
            reconcile::export_path(db, user_id, &args.path).await?;
            println!("Exported to {}", args.path.display());
            Ok(())
        }
        Command::Share(args) => share_command(&ctx, args.command).await,
    }
}

async fn dashboard(ctx: &Context<'_>, window: DateWindow) -> Result<()> {
    let settings = ctx.settings().await?;
    let snapshot = ledger::load_snapshot_or_empty(ctx.db, ctx.user_id).await;
    let stats = ledger::dashboard_stats(&snapshot, settings.monthly_budget, window, local_now());
    let currency = &settings.currency;

    println!("Dashboard ({window})");
    println!("  Budget:    {}", format_amount(stats.monthly_budget, currency));
    println!(
        "  Spent:     {}  {}",
        format_amount(stats.monthly_spent, currency),
        format_progress_bar(
            budget_used_percent(stats.monthly_spent, stats.monthly_budget),
            None
        )
    );
    println!("  Remaining: {}", format_amount(stats.remaining_budget, currency));
    println!("  Consumed:  {}", format_quantity(stats.total_consumed));
    for (category, quantity) in &stats.consumption_by_category {
        println!("    {:<10} {}", category.as_str(), format_quantity(*quantity));
    }
    Ok(())
}

async fn inventory(ctx: &Context<'_>) -> Result<()> {
    let settings = ctx.settings().await?;
    let snapshot = ledger::load_snapshot_or_empty(ctx.db, ctx.user_id).await;
    let metrics = ledger::product_metrics(&snapshot);

    if metrics.is_empty() {
        println!("No products yet");
        return Ok(());
    }

    let mut total_value = 0.0;
    for m in &metrics {
        total_value += m.inventory_value;
        println!(
            "{:>4}  {:<28} {:<10} stock {:>8}  avg {:>12}  value {:>12}  {:>6}/day  {}",
            m.product_id,
            m.name,
            m.category.as_str(),
            format_quantity(m.stock),
            format_amount(m.average_unit_cost, &settings.currency),
            format_amount(m.inventory_value, &settings.currency),
            format_quantity(m.run_rate),
            format_days_remaining(m.days_remaining)
        );
    }
    println!(
        "Inventory value: {}",
        format_amount(total_value, &settings.currency)
    );
    Ok(())
}

async fn analytics(ctx: &Context<'_>, window: DateWindow) -> Result<()> {
    let settings = ctx.settings().await?;
    let snapshot = ledger::load_snapshot_or_empty(ctx.db, ctx.user_id).await;
    let now = local_now();
    let report = ledger::cost_analytics(&snapshot, window.start(now), ctx.config.top_products);
    let currency = &settings.currency;

    println!("Cost analytics ({window})");
    println!("  Total spent:     {}", format_amount(report.total_spent, currency));
    println!("  Consumed:        {}", format_quantity(report.total_consumed));
    println!(
        "  Consumed cost:   {}",
        format_amount(report.total_consumed_cost, currency)
    );
    println!("  Cost per item:   {}", format_amount(report.cost_per_item, currency));
    println!("  Cost per day:    {}", format_amount(report.cost_per_day, currency));
    println!(
        "  Given away:      {}",
        format_amount(report.given_away_cost, currency)
    );

    println!("By category:");
    for (category, cost) in &report.cost_by_category {
        println!("  {:<10} {}", category.as_str(), format_amount(*cost, currency));
    }
    println!("By month:");
    for month in &report.cost_by_month {
        println!("  {} {}", month.label(), format_amount(month.cost, currency));
    }
    println!("Top products:");
    for (rank, p) in report.top_products.iter().enumerate() {
        println!(
            "  {}. {} - {} x {} = {}",
            rank + 1,
            p.name,
            format_quantity(p.quantity),
            format_amount(p.unit_cost, currency),
            format_amount(p.cost, currency)
        );
    }

    println!("This month: {}", format_heatmap(&ledger::daily_totals(&snapshot, now.year(), now.month())));
    println!("Weekly:");
    for week in ledger::weekly_totals(&snapshot) {
        println!("  {} {}", week.week_start, format_quantity(week.quantity));
    }
    Ok(())
}

async fn history(ctx: &Context<'_>, window: DateWindow) -> Result<()> {
    let since = window.start(local_now());
    let snapshot = ledger::load_snapshot_or_empty(ctx.db, ctx.user_id).await;
    let name = |id: i64| snapshot.product(id).map_or("?", |p| p.name.as_str());

    println!("Consumption ({window}):");
    for c in snapshot
        .consumption
        .iter()
        .filter(|c| since.is_none_or(|s| c.consumed_at >= s))
    {
        println!(
            "  #{:<5} {}  {:<28} {}",
            c.id,
            c.consumed_at.format("%Y-%m-%d %H:%M"),
            name(c.product_id),
            format_quantity(c.quantity)
        );
    }
    println!("Giveaways ({window}):");
    for g in snapshot
        .giveaways
        .iter()
        .filter(|g| since.is_none_or(|s| g.given_at >= s))
    {
        println!(
            "  {}  {:<28} {}  {}",
            g.given_at.format("%Y-%m-%d %H:%M"),
            name(g.product_id),
            format_quantity(g.quantity),
            g.recipient.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn product_command(ctx: &Context<'_>, command: ProductCommand) -> Result<()> {
    match command {
        ProductCommand::Add {
            name,
            category,
            detail,
        } => {
            let created = product::create_product(ctx.db, ctx.user_id, &name, category, detail).await?;
            println!("Added {} ({}) as #{}", created.name, created.category, created.id);
        }
        ProductCommand::List => {
            for p in product::list_products(ctx.db, ctx.user_id).await? {
                println!(
                    "{:>4}  {:<28} {:<10} {}",
                    p.id,
                    p.name,
                    p.category,
                    p.detail.as_deref().unwrap_or("")
                );
            }
        }
        ProductCommand::Edit {
            id,
            name,
            category,
            detail,
        } => {
            let updated =
                product::update_product(ctx.db, ctx.user_id, id, &name, category, detail).await?;
            println!("Updated #{} to {} ({})", updated.id, updated.name, updated.category);
        }
        ProductCommand::Delete(args) => {
            product::delete_product(ctx.db, ctx.user_id, args.id).await?;
            println!("Deleted product #{} and its history", args.id);
        }
    }
    Ok(())
}

async fn share_command(ctx: &Context<'_>, command: ShareCommand) -> Result<()> {
    match command {
        ShareCommand::Create => {
            let token = settings::generate_share_token(ctx.db, ctx.user_id).await?;
            println!("Share token: {token}");
        }
        ShareCommand::Revoke => {
            settings::revoke_share_token(ctx.db, ctx.user_id).await?;
            println!("Sharing turned off");
        }
        ShareCommand::Prefs {
            dashboard,
            history,
            inventory,
            purchases,
        } => {
            let preferences = SharePreferences {
                dashboard,
                history,
                inventory,
                purchases,
            };
            settings::update_share_preferences(ctx.db, ctx.user_id, preferences).await?;
            println!("Share preferences saved");
        }
        ShareCommand::Show { token } => {
            let view =
                share::resolve_shared_view(ctx.db, &token, local_now(), ctx.config.top_products)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}
