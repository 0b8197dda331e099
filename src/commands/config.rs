use crate::Context;
use crate::paths;
use crate::ui;
use anyhow::Result;

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Configuration");

    let path = paths::config_file()?;
    ui::kv("Config file", &path.display().to_string());
    if path.exists() {
        ui::kv("Status", "loaded");
    } else {
        ui::kv("Status", "not found, using defaults");
    }
    if let Ok(dir) = std::env::var(paths::ENV_CONFIG_DIR) {
        ui::dim(&format!("{} = {dir}", paths::ENV_CONFIG_DIR));
    }

    ui::header("Effective values");
    println!("{}", ctx.config.to_toml()?);
    Ok(())
}
