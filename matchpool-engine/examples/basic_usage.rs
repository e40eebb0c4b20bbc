use matchpool_engine::{
    CollateralVault, Matchpool, MatchpoolConfig, OutcomeReporter, Storage,
};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    let storage = Arc::new(Storage::new(&temp_dir.path().join("matchpool.db")).await?);
    let vault = Arc::new(CollateralVault::new(storage.clone(), "matchpool"));
    let reporter = Arc::new(OutcomeReporter::new(storage.clone(), "oracle"));

    // 1 unit = 1_000_000 base units
    let price = 1_000_000;
    let engine = Matchpool::new(
        MatchpoolConfig::new("owner", price),
        storage,
        vault.clone(),
        reporter.clone(),
    )
    .await?;

    // Fund two players and let the engine pull their stakes
    for player in ["alice", "bob"] {
        vault.mint(player, 2 * price).await?;
        vault.approve(player, "matchpool", 2 * price).await?;
    }

    // Register a round of two three-way matches
    let matches = vec![hex::encode([1u8; 32]), hex::encode([2u8; 32])];
    let round = engine.add_matches("owner", &matches, 3).await?;
    println!("Registered round {round} with {} matches", matches.len());

    // Players bet once per round, one prediction per match
    engine.place_bets("alice", round, &[0, 1]).await?;
    engine.place_bets("bob", round, &[0, 2]).await?;
    println!("Bets placed, {} bettors in round", engine.round_bettors(round).await?);

    // The oracle reports the final outcomes
    reporter.report_outcome("oracle", &matches[0], 0).await?;
    reporter.report_outcome("oracle", &matches[1], 1).await?;

    // Players claim their shares
    for player in ["alice", "bob"] {
        let records = engine.distribute_positions(player, round).await?;
        for record in records {
            println!(
                "{player} received {} base units for match {}",
                record.paid, record.handle
            );
        }
        println!("{player} balance: {} base units", vault.balance_of(player).await?);
    }

    let report = engine.pool_report(round, &matches[0]).await?;
    println!(
        "Match {} pool: {} total, {} winners, {} remainder",
        report.handle, report.pool_total, report.correct_count, report.remainder
    );

    println!("\nExample completed successfully!");
    Ok(())
}
