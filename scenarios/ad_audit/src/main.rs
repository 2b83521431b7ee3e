use ldap_dirstress_runner::prelude::*;

fn main() -> DirstressResult<()> {
    let builder =
        LdapScenarioDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"), Mode::Audit)?
            .into_std()
            .with_default_duration_s(60);

    let summary = run(builder)?;

    let findings = summary
        .checks
        .iter()
        .filter(|(_, check)| !check.informational && check.failures > 0)
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>();
    if !findings.is_empty() {
        anyhow::bail!("Audit found security issues: {}", findings.join(", "));
    }

    log::info!("No security issues found");
    Ok(())
}
