use anyhow::{Result, anyhow};
use colored::*;
use std::collections::BTreeSet;

use docidx::{CrateIndex, SearchIndex};

fn print_children(krate: &CrateIndex, parent: usize, indent: usize) {
    for (_, child) in krate.children(parent) {
        println!(
            "{}{} {} {}",
            "  ".repeat(indent),
            "└─".blue(),
            child.name.green(),
            format!("({})", child.ty).dimmed()
        );
    }
}

fn print_crate(krate: &CrateIndex) {
    println!(
        "{} {} {}",
        "📦".cyan(),
        krate.name.bold().green(),
        format!("({} items)", krate.items.len()).dimmed()
    );

    let mut shown = BTreeSet::new();

    for (idx, item) in krate.items.iter().enumerate() {
        if item.parent.is_some() {
            continue;
        }
        println!(
            "  {} {} {}",
            "└─".blue(),
            item.name.green(),
            format!("({})", item.ty).dimmed()
        );
        if let Some(entry) = krate.path_entry_for(idx) {
            shown.insert(entry);
            print_children(krate, entry, 2);
        }
    }

    // Members of types the crate does not document itself, e.g. impls on
    // foreign types
    let foreign: BTreeSet<usize> = krate
        .items
        .iter()
        .filter_map(|item| item.parent)
        .filter(|parent| !shown.contains(parent))
        .collect();
    for parent in foreign {
        let Some(entry) = krate.paths.get(parent) else {
            continue;
        };
        println!(
            "  {} {} {}",
            "└─".blue(),
            entry.name.yellow(),
            format!("({}, external)", entry.ty).dimmed()
        );
        print_children(krate, parent, 2);
    }
}

/// Print the item tree of one crate, or of every crate
pub fn show_tree(index: &SearchIndex, crate_name: Option<&str>) -> Result<()> {
    match crate_name {
        Some(name) => {
            let krate = index
                .get_crate(name)
                .ok_or_else(|| anyhow!("Crate '{}' not found in the index", name))?;
            println!("{} Item Tree:\n", "📊".cyan());
            print_crate(krate);
        }
        None => {
            println!("{} Item Tree:\n", "📊".cyan());
            for krate in &index.crates {
                print_crate(krate);
                println!();
            }
        }
    }

    Ok(())
}
