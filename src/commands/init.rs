use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the giro home directory and a default `config.json` in it.
///
/// # Errors
/// - Returns an error if the directory cannot be created or a config file already exists.
pub fn init(giro_home: &Path) -> Result<Out<()>> {
    let config = Config::create(giro_home).context("Unable to create the giro home and config")?;
    Ok(format!(
        "Created {}, add the bankgiro and plusgiro settings there",
        config.config_path().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("giro");
        let out = init(&home).unwrap();
        assert!(out.message().contains("config.json"));
        assert!(Config::load(&home).is_ok());
        assert!(init(&home).is_err());
    }
}
