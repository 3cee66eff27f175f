//! Config command handlers

use crate::adapter::AdapterFactory;
use crate::cli::{ConfigInitArgs, ConfigValidateArgs};
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../conduit.example.toml");

/// Handle `conduit config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Check if file exists
    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    println!("✓ Configuration file created: {}", args.output.display());
    println!("  Edit this file to declare your capabilities and providers.");

    Ok(())
}

/// Handle `conduit config validate` command
///
/// Runs the same checks as startup except adapter construction, so missing
/// credentials are not reported here; unknown adapter types are.
pub fn handle_config_validate(
    args: &ConfigValidateArgs,
) -> Result<String, Box<dyn std::error::Error>> {
    let config = crate::cli::load_config(&args.config)?;

    let factory = AdapterFactory::default();
    for provider in &config.providers {
        if !factory.supports(&provider.adapter) {
            return Err(format!(
                "provider '{}' uses unknown adapter type '{}' (known: {})",
                provider.id,
                provider.adapter,
                factory.kinds().join(", ")
            )
            .into());
        }
    }

    Ok(format!(
        "✓ {} is valid: {} capabilities, {} providers",
        args.config.display(),
        config.capabilities.len(),
        config.providers.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile;

    #[test]
    fn test_config_init_creates_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("conduit.toml");

        let args = ConfigInitArgs {
            output: output_path.clone(),
            force: false,
        };

        handle_config_init(&args).unwrap();

        assert!(output_path.exists());
        let content = std::fs::read_to_string(&output_path).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("[[providers]]"));
    }

    #[test]
    fn test_config_init_no_overwrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("conduit.toml");

        std::fs::write(&output_path, "existing").unwrap();

        let args = ConfigInitArgs {
            output: output_path.clone(),
            force: false,
        };

        let result = handle_config_init(&args);
        assert!(result.is_err());

        // Original content preserved
        let content = std::fs::read_to_string(&output_path).unwrap();
        assert_eq!(content, "existing");
    }

    #[test]
    fn test_config_init_force_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("conduit.toml");

        std::fs::write(&output_path, "old content").unwrap();

        let args = ConfigInitArgs {
            output: output_path.clone(),
            force: true,
        };

        handle_config_init(&args).unwrap();

        let content = std::fs::read_to_string(&output_path).unwrap();
        assert!(content.contains("[server]"));
    }

    #[test]
    fn test_config_validate_example() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("conduit.toml");
        std::fs::write(&path, EXAMPLE_CONFIG).unwrap();

        let message = handle_config_validate(&ConfigValidateArgs { config: path }).unwrap();
        assert!(message.contains("is valid"));
    }

    #[test]
    fn test_config_validate_unknown_adapter() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("conduit.toml");
        std::fs::write(
            &path,
            r#"
            [[capabilities]]
            name = "text_classification"

            [[providers]]
            id = "mystery"
            adapter = "carrier-pigeon"
            capabilities = ["text_classification"]
            "#,
        )
        .unwrap();

        let err = handle_config_validate(&ConfigValidateArgs { config: path }).unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_config_validate_missing_file() {
        let args = ConfigValidateArgs {
            config: "/nonexistent/conduit.toml".into(),
        };
        assert!(handle_config_validate(&args).is_err());
    }
}
