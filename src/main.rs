use std::{thread, time::Duration};

use anyhow::{anyhow, Context};
use log::{error, info};
use tryout::{config::PoolConfig, Orchestrator, Outcome, TimeUnit, WorkerPool};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = PoolConfig::builder()
        .fixed(4, 64)
        .thread_name("demo")
        .finalize()?;
    let pool = WorkerPool::from_config(config)?;

    Orchestrator::with_pool(pool).scope(|orchestrator| {
        orchestrator
            .add(|| Ok(1 + 2))
            .add(|| Ok(3 * 3))
            .add(|| Err(anyhow!("this one fails")))
            .add(|| {
                thread::sleep(Duration::from_secs(2));
                Ok(0)
            });

        orchestrator
            .execute()
            .with_timeout(500, TimeUnit::Milliseconds)
            .on_complete(report)
            .context("batch did not run")?;
        Ok(())
    })
}

fn report(outcome: Outcome<Vec<tryout::FutureHandle<i32>>, tryout::OrchestrationError>) {
    for handle in outcome.or_else(vec![]) {
        let id = handle.id();
        handle
            .outcome()
            .on_success(|value| info!("task #{} -> {:?}", id, value))
            .on_failure(|e| error!("task #{} -> {}", id, e));
    }
}
