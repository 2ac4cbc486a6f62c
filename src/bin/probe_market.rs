// src/bin/probe_market.rs
use chrono::Duration;
use federal_market_dashboard::models::SelectionMode;
use federal_market_dashboard::services::cache::SystemClock;
use federal_market_dashboard::services::fiscal::{federal_today, QuickRange};
use federal_market_dashboard::services::markets::MarketRegistry;
use federal_market_dashboard::services::overview::{
    assemble_market_overview, AssemblySettings, MarketQuery,
};
use federal_market_dashboard::services::usaspending::{UsaSpendingClient, DEFAULT_BASE_URL};
use std::env;
use std::sync::Arc;

/// Assemble one live overview against the real API and print a summary.
/// Usage: probe_market ["Market Name"]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let market = env::args().nth(1).unwrap_or_else(|| "Electronic Warfare".to_string());
    let registry = MarketRegistry::default();
    let psc_codes = registry
        .psc_codes(&market)
        .ok_or_else(|| anyhow::anyhow!("unknown market '{}'", market))?;
    let range = QuickRange::CurrentYear
        .date_range(federal_today())
        .ok_or_else(|| anyhow::anyhow!("could not compute the current fiscal year"))?;

    let base_url = env::var("USASPENDING_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let client = UsaSpendingClient::new(base_url, Duration::seconds(5), Arc::new(SystemClock))?;

    let query = MarketQuery {
        market: &market,
        psc_codes,
        range,
        mode: SelectionMode::Quick,
    };
    let overview = assemble_market_overview(&client, &query, &AssemblySettings::default()).await?;

    println!("Market:            {}", overview.market_name);
    println!("Window:            {} to {}", range.start_date, range.end_date);
    println!("Total market size: {:.2}", overview.total_market_size);
    println!("YoY growth:        {:.2}%", overview.yoy_growth);
    println!("Timeline points:   {}", overview.timeline_data.len());
    println!("Awards:            {}", overview.awards.len());
    println!("Funding offices:   {}", overview.funding_offices.len());
    for office in overview.funding_offices.iter().take(5) {
        println!("  {:<40} {:>18.2}", office.key, office.total_obligation);
    }
    Ok(())
}
