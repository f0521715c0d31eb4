use colored::*;
use sha2::{Digest, Sha256};
use std::{fs, path::Path};

use docidx::SearchIndex;

/// SHA-256 of the index file as stored on disk
pub fn compute_digest(path: &Path) -> Result<String, String> {
    let content =
        fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let mut hasher = Sha256::new();
    hasher.update(content);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn show_stats(index: &SearchIndex, path: &Path) -> Result<(), String> {
    let digest = compute_digest(path)?;

    println!("{} {}", "📊".cyan(), path.display().to_string().bold());
    println!("  {} {}", "sha256:".bright_black(), digest.dimmed());
    println!(
        "  {} crate(s), {} item(s)\n",
        index.crates.len().to_string().bold(),
        index.total_items().to_string().bold()
    );

    for krate in &index.crates {
        let with_signature = krate
            .items
            .iter()
            .filter(|item| item.signature.is_some())
            .count();
        let deprecated = krate.items.iter().filter(|item| item.deprecated).count();

        println!("{} {}", "📦".cyan(), krate.name.green().bold());
        for (kind, count) in krate.kind_counts() {
            println!("  {} {:<20} {}", "•".blue(), kind.to_string(), count);
        }
        println!(
            "  {} {} of {} item(s) have a searchable signature",
            "ƒ".cyan(),
            with_signature,
            krate.items.len()
        );
        if deprecated > 0 {
            println!("  {} {} deprecated", "⚠️".yellow(), deprecated);
        }
        println!();
    }

    Ok(())
}
