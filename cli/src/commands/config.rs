use netinv_common::config::DiscoveryConfig;

pub fn config(cfg: &DiscoveryConfig) -> anyhow::Result<()> {
    println!("{}", cfg.to_toml()?);
    Ok(())
}
