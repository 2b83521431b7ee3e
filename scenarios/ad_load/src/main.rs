use ldap_dirstress_runner::prelude::*;

fn main() -> DirstressResult<()> {
    let builder = LdapScenarioDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"), Mode::Load)?
        .into_std()
        .with_default_duration_s(60);

    let summary = run(builder)?;

    if summary.aborted_by_threshold {
        anyhow::bail!("The run was stopped early because a threshold was breached");
    }
    if !summary.thresholds_passed() {
        anyhow::bail!("One or more thresholds failed");
    }

    Ok(())
}
