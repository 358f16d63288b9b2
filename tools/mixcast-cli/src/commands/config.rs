//! Show or initialise the configuration file.

use mixcast_common::config::AppConfig;

pub fn run(config: &AppConfig, init: bool, force: bool) -> anyhow::Result<()> {
    let path = AppConfig::path();

    if init {
        if path.exists() && !force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }
        let written = AppConfig::default().save()?;
        println!("Wrote default configuration to {}", written.display());
        return Ok(());
    }

    let source = if path.exists() { "file" } else { "defaults" };
    println!("# {} ({source})", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
