use colored::*;
use std::{fs, path::Path};

use crate::config::CONFIG_FILE;

const TEMPLATE: &str = r#"# docidx Configuration File

# Search index written by the documentation generator
# Plain `.js`, raw JSON and gzip-compressed files are all accepted
index = "target/doc/search-index.js"

# Maximum number of search results to show
limit = 20

# Largest edit distance accepted for fuzzy name matches
# Defaults to a third of the query length when not set
# max_distance = 2

# Show item descriptions next to results
show_descriptions = true

# Highlight rendered function signatures
highlight = true

# Only search these crates (empty searches every crate in the index)
crates = []
"#;

pub fn init_config(dir: &Path, force: bool) -> Result<(), String> {
    let config_path = dir.join(CONFIG_FILE);

    if config_path.exists() && !force {
        return Err(format!(
            "{} already exists. Use --force to overwrite.",
            CONFIG_FILE
        ));
    }

    fs::write(&config_path, TEMPLATE)
        .map_err(|e| format!("Failed to create {}: {}", CONFIG_FILE, e))?;

    println!("{} Created {}", "✅".green(), CONFIG_FILE);
    println!("\n{}", "Configuration file created with defaults:".cyan());
    println!("  {} index = \"target/doc/search-index.js\"", "•".blue());
    println!("  {} limit = 20", "•".blue());
    println!("  {} show_descriptions = true", "•".blue());
    println!("  {} highlight = true", "•".blue());
    println!(
        "\n{}",
        format!("Edit {} to point at your documentation build.", CONFIG_FILE).cyan()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = toml::from_str(TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        fs::write(dir.path().join(CONFIG_FILE), "limit = 3").unwrap();
        assert!(init_config(dir.path(), false).is_err());
        assert_eq!(
            fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap(),
            "limit = 3"
        );

        init_config(dir.path(), true).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap(),
            TEMPLATE
        );
    }
}
