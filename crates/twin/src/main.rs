use std::sync::Arc;
use std::thread;

use anyhow::Context;
use serde_json::json;

use procura_ai::OrderAnomalyDetector;
use procura_twin::{DigitalTwin, InMemoryTwinStore, SimulationConfig, SimulationRunner, demo};

fn main() -> anyhow::Result<()> {
    let config = SimulationConfig::from_env().context("invalid simulation config")?;
    procura_observability::init(&config.tracing);

    let days = std::env::var("PROCURA_RUN_DAYS")
        .unwrap_or_else(|_| "30".to_string())
        .parse::<i64>()
        .unwrap_or_else(|_| {
            tracing::warn!("PROCURA_RUN_DAYS is not a number; running 30 days");
            30
        });

    let state = demo::demo_state(config.seed, config.start_date).context("building demo catalogue")?;

    let mut detector = OrderAnomalyDetector::new();
    detector
        .train(&state.training_samples())
        .context("training anomaly detector")?;
    tracing::info!(trained = detector.is_trained(), "anomaly detector ready");

    let twin = Arc::new(DigitalTwin::with_state(
        config.clone(),
        InMemoryTwinStore::new(),
        detector,
        state,
    )?);

    let runner = SimulationRunner::new(config.tick_interval())
        .spawn("procura-scheduler", twin.clone())
        .context("spawning scheduler thread")?;
    twin.toggle(true);

    let start = twin.today();
    let mut last_report = start;
    while (twin.today() - start).num_days() < days {
        thread::sleep(config.tick_interval());

        let today = twin.today();
        if (today - last_report).num_days() >= 7 {
            last_report = today;
            let status = twin.status();
            tracing::info!(
                date = %status.current_date,
                pending_approvals = twin.pending_approvals().len(),
                latest_event = status.events.first().map(|e| e.message.as_str()).unwrap_or("-"),
                "weekly status"
            );
        }
    }

    twin.toggle(false);
    runner.shutdown();

    let summary = json!({
        "status": twin.status(),
        "last_stat": twin.daily_stats().last(),
        "at_risk": twin.predictions(5),
        "orders": twin.orders().len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
