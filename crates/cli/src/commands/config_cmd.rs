//! `disclaude config` — Configuration management commands.

use disclaude_config::AppConfig;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let mut redacted = config.clone();
    for key in [&mut redacted.agent.api_key, &mut redacted.agent.glm_api_key] {
        if key.is_some() {
            *key = Some("[REDACTED]".into());
        }
    }
    println!("{}", toml::to_string_pretty(&redacted)?);

    match config.resolve_agent() {
        Ok(agent) => println!("# backend: {} ({})", agent.provider, agent.model),
        Err(e) => println!("# ⚠️  {e}"),
    }
    Ok(())
}

pub fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let config_path = dir.join("config.toml");
    if config_path.exists() {
        return Err(format!("Config already exists: {}", config_path.display()).into());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());
    Ok(())
}
