use std::{thread, time::Duration};

use anyhow::anyhow;
use log::info;
use tryout_core::{Orchestrator, Outcome, TimeUnit};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut orchestrator = Orchestrator::create().scoped();
    orchestrator
        .add(|| Ok("fast".to_string()))
        .add(|| Err(anyhow!("broken input")))
        .add(|| {
            thread::sleep(Duration::from_secs(1));
            Ok("slow".to_string())
        });

    let outcomes = orchestrator
        .execute()
        .with_timeout(100, TimeUnit::Milliseconds)
        .outcomes()?;

    for (idx, outcome) in outcomes.into_iter().enumerate() {
        let length = outcome.map(|s| Ok(s.len()));
        info!("task {} -> {:?}", idx, length);
    }

    let parsed: Outcome<u16> = Outcome::attempt_value(|| Ok("8080".parse()?));
    info!("port: {}", parsed.filter(|port| *port > 1024).or_else(8000));

    Ok(())
}
