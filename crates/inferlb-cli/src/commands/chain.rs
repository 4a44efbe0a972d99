use anyhow::Context;

use inferlb_scheduling::PolicyResolver;

pub fn chain(config: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config)?;
    let root = PolicyResolver::from_config(&config)
        .resolve(&config.policy.name, config.policy.target_metric.as_deref())
        .context("resolving scheduling policy")?;

    println!("{}", serde_json::to_string_pretty(&root)?);
    Ok(())
}
