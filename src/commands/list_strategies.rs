use crate::strategy::StrategyRegistry;
use anyhow::Result;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::with_builtins();
    for algorithm_id in registry.list() {
        println!("{}", algorithm_id);
    }
    Ok(())
}
