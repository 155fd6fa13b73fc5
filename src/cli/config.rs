use crate::config::PlaygroundConfig;
use crate::dirs;
use crate::error::Result;

/// Execute the `config` command: show, or with `init` write, the config file.
pub fn execute(init: bool) -> Result<()> {
    let path = dirs::config_path();

    if init {
        if path.exists() {
            println!("Config file already exists at {}", path.display());
            return Ok(());
        }
        PlaygroundConfig::default().save()?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let config = PlaygroundConfig::load_from(&path)?;
    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
