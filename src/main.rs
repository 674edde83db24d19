//! Loyalty ledger walkthrough
//!
//! Enrolls two passengers, moves them through the tiers and reports the walkthrough as a single
//! scenario to the log metrics sink.

use std::sync::Arc;

use airline_loyalty_ledger::{
    adapters::metrics::log::LogMetrics,
    commands::{FinishRun, MetricsReporter, ScenarioStatus, ScenarioTimer},
    config::ReporterConfig,
    MembershipLedger, Tier,
};
use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DIANA: &str = "Diana Prince";
const CLARK: &str = "Clark Kent";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,airline_loyalty_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config = ReporterConfig::from_env();
    let mut reporter = MetricsReporter::new(Arc::new(LogMetrics::default()), config);

    let timer = ScenarioTimer::start("Loyalty program", "Walkthrough").with_labels(["demo"]);
    let status = if walkthrough(&MembershipLedger::new()) {
        ScenarioStatus::Passed
    } else {
        ScenarioStatus::Failed
    };
    reporter.report(timer.finish(status)).await?;

    let summary = reporter.finish(FinishRun::now()).await?;
    tracing::info!(?summary, "walkthrough complete");

    Ok(())
}

/// Run the walkthrough, returning whether every step behaved as expected
fn walkthrough(ledger: &MembershipLedger) -> bool {
    let enrolled = ledger.enroll(DIANA) && ledger.enroll(CLARK);
    tracing::info!(enrolled, "added members {DIANA} and {CLARK}");

    let accrued = ledger.add_points(DIANA, 6_000) && ledger.add_points(CLARK, 16_000);
    log_member(ledger, DIANA);
    log_member(ledger, CLARK);
    let promoted =
        ledger.tier(DIANA) == Some(Tier::Silver) && ledger.tier(CLARK) == Some(Tier::Gold);

    let redeemed = ledger.redeem_points(DIANA, 2_000);
    tracing::info!(redeemed, "{DIANA} redeemed 2000 points");
    log_member(ledger, DIANA);

    let overdrawn = ledger.redeem_points(CLARK, 20_000);
    tracing::info!(redeemed = overdrawn, "{CLARK} tried to redeem 20000 points");
    log_member(ledger, CLARK);

    let demoted = ledger.tier(DIANA) == Some(Tier::Bronze);
    let unchanged = ledger
        .details(CLARK)
        .map(|member| member.points() == 16_000 && member.tier() == Tier::Gold)
        .unwrap_or(false);

    enrolled && accrued && promoted && redeemed && !overdrawn && demoted && unchanged
}

fn log_member(ledger: &MembershipLedger, identifier: &str) {
    match ledger.details(identifier) {
        Some(member) => tracing::info!(
            identifier,
            points = member.points(),
            tier = %member.tier(),
            "member details"
        ),
        None => tracing::warn!(identifier, "member not found"),
    }
}
