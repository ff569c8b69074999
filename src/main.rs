use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

use tcg_tracker::{
    add_card, delete_card, export_filename, overview, update_price, write_csv, Config, SortKey,
    Store, UpdateOutcome,
};

const USAGE: &str = "\
Usage: tcg-tracker <command>

Commands:
  add <card_code> <price> <name...>   Add a card (e.g. add OP13-118 5.00 Monkey D. Luffy)
  update <id> <price>                 Record a new price
  delete <id>                         Delete a card and its history
  list [query] [--sort KEY] [--json]  Show cards (KEY: price_desc, price_asc, name_asc, newest)
  dashboard                           Collection value and top movers
  history <id>                        Recent prices of one card
  export [path]                       Write the collection as CSV

Environment: TCG_DB_PATH (default tcg.db), TCG_HISTORY_LIMIT (default 5)";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::from_env()?;
    let mut store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    match command.as_str() {
        "add" => run_add(&mut store, &args[1..]),
        "update" => run_update(&mut store, &args[1..]),
        "delete" => run_delete(&mut store, &args[1..]),
        "list" => run_list(&store, &config, &args[1..]),
        "dashboard" => run_dashboard(&store, &config),
        "history" => run_history(&store, &config, &args[1..]),
        "export" => run_export(&store, &args[1..]),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn parse_id(raw: Option<&String>) -> Result<i64> {
    let raw = raw.context("Missing card id")?;
    raw.parse().with_context(|| format!("Invalid card id '{}'", raw))
}

fn parse_price(raw: Option<&String>) -> Result<f64> {
    let raw = raw.context("Missing price")?;
    // Accept a decimal comma as typed in German/French locales
    raw.replace(',', ".")
        .parse()
        .with_context(|| format!("Invalid price '{}'", raw))
}

fn run_add(store: &mut Store, args: &[String]) -> Result<()> {
    let code = args.first().context("Missing card code")?;
    let price = parse_price(args.get(1))?;
    let name = args.get(2..).unwrap_or_default().join(" ");

    let card = add_card(store, &name, price, code)?;
    println!(
        "✓ Added #{} {} '{}' ({}) at {:.2}",
        card.id, card.card_code, card.name, card.set_name, card.price
    );
    Ok(())
}

fn run_update(store: &mut Store, args: &[String]) -> Result<()> {
    let id = parse_id(args.first())?;
    let price = parse_price(args.get(1))?;

    match update_price(store, id, price)? {
        UpdateOutcome::Updated(card) => {
            println!("✓ {} '{}' now at {:.2}", card.card_code, card.name, card.price)
        }
        UpdateOutcome::CardNotFound => println!("No card #{}, nothing changed", id),
    }
    Ok(())
}

fn run_delete(store: &mut Store, args: &[String]) -> Result<()> {
    let id = parse_id(args.first())?;
    if delete_card(store, id)? {
        println!("✓ Deleted card #{}", id);
    } else {
        println!("No card #{}, nothing changed", id);
    }
    Ok(())
}

fn run_list(store: &Store, config: &Config, args: &[String]) -> Result<()> {
    let mut query = String::new();
    let mut sort = SortKey::Newest;
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--sort" => sort = SortKey::parse(iter.next().context("--sort needs a value")?),
            "--json" => json = true,
            text => query = text.to_string(),
        }
    }

    let view = overview(store, &query, sort, config.history_limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{:>4}  {:<12} {:<30} {:<8} {:>10}  trend", "id", "code", "name", "edition", "price");
    println!("{}", "━".repeat(76));
    for card in &view.cards {
        let trend = view
            .trends
            .get(&card.id)
            .map(|t| t.trend.as_str())
            .unwrap_or("none");
        println!(
            "{:>4}  {:<12} {:<30} {:<8} {:>10.2}  {}",
            card.id, card.card_code, card.name, card.set_name, card.price, trend
        );
    }
    println!("\n{} cards, total {:.2}", view.summary.card_count, view.summary.total_value);
    Ok(())
}

fn run_dashboard(store: &Store, config: &Config) -> Result<()> {
    let summary = overview(store, "", SortKey::Newest, config.history_limit)?.summary;

    println!("📊 Collection");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Cards:        {}", summary.card_count);
    println!("Total value:  {:.2}", summary.total_value);

    match (&summary.top_gainer, &summary.top_loser) {
        (Some(gainer), Some(loser)) => {
            println!("Top gainer:   {} '{}' {:+.2}", gainer.card.card_code, gainer.card.name, gainer.diff);
            println!("Top loser:    {} '{}' {:+.2}", loser.card.card_code, loser.card.name, loser.diff);
        }
        _ => println!("No price changes recorded yet"),
    }
    Ok(())
}

fn run_history(store: &Store, config: &Config, args: &[String]) -> Result<()> {
    let id = parse_id(args.first())?;
    let Some(card) = store.get_card(id)? else {
        bail!("No card #{}", id);
    };

    let total = store.count_history(id)?;
    println!("{} '{}' ({} prices recorded)", card.card_code, card.name, total);
    for entry in store.recent_history(id, config.history_limit)? {
        println!("  {}  {:>10.2}", entry.created_at.format("%Y-%m-%d %H:%M"), entry.price);
    }
    Ok(())
}

fn run_export(store: &Store, args: &[String]) -> Result<()> {
    let path = match args.first() {
        Some(path) => path.clone(),
        None => export_filename(chrono::Local::now()),
    };

    let file = std::fs::File::create(Path::new(&path))
        .with_context(|| format!("Failed to create {}", path))?;
    let count = write_csv(store, file)?;
    println!("✓ Exported {} cards to {}", count, path);
    Ok(())
}
