use inferlb_scheduling::Policy;

pub fn policies() -> anyhow::Result<()> {
    for policy in Policy::ALL {
        let needs = if policy.needs_target_metric() {
            " (requires policy.target_metric)"
        } else {
            ""
        };
        println!("  {:<12} {}{needs}", policy.as_str(), policy.description());
    }
    Ok(())
}
