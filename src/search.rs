//! Search and lookup commands over a loaded documentation index

use anyhow::{Result, anyhow};
use colored::*;
use std::io::{self, BufRead, Write};

use crate::config::Config;
use crate::syntax::highlight_rust_code;
use crate::tree::show_tree;
use docidx::query::{self, MatchKind, Query, SearchHit, SearchOptions};
use docidx::{CrateIndex, SearchIndex};

#[derive(Debug)]
pub struct SearchContext<'a> {
    pub index: &'a SearchIndex,
    pub config: &'a Config,
}

impl SearchContext<'_> {
    fn options(&self, crates: &[String], limit: Option<usize>) -> SearchOptions {
        SearchOptions {
            crate_filter: if crates.is_empty() {
                self.config.crates.clone()
            } else {
                crates.to_vec()
            },
            limit: limit.unwrap_or(self.config.limit),
            max_distance: self.config.max_distance,
        }
    }

    fn signature(&self, signature: &str) -> String {
        if self.config.highlight {
            highlight_rust_code(signature)
        } else {
            signature.to_string()
        }
    }
}

/// Run a query and print the hits, or emit them as JSON
pub fn search(
    ctx: &SearchContext,
    text: &str,
    crates: &[String],
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let query = Query::parse(text)?;
    let hits = query::run(ctx.index, &query, &ctx.options(crates, limit));

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{} No results found for '{}'", "ℹ️".blue(), query.raw);
        print_suggestions(ctx.index, &query.name);
        return Ok(());
    }

    println!("\n{} Found {} result(s):\n", "🔍".cyan(), hits.len());
    for hit in &hits {
        display_hit(ctx, hit);
    }
    Ok(())
}

/// Show one item by its full path
pub fn show_item(ctx: &SearchContext, path: &str) -> Result<()> {
    match ctx.index.find_by_path(path) {
        Some((krate, idx)) => {
            display_item(ctx, krate, idx);
            Ok(())
        }
        None => {
            print_suggestions(ctx.index, path);
            Err(anyhow!("Item '{}' not found in the index", path))
        }
    }
}

/// List every crate in the index
pub fn list_crates(index: &SearchIndex) {
    println!("\n{} {} crate(s):\n", "📚".cyan(), index.crates.len());
    for krate in &index.crates {
        println!(
            "  {} {} ({} items)",
            "•".cyan(),
            krate.name.green(),
            krate.items.len().to_string().dimmed()
        );
        if !krate.doc.is_empty() {
            println!("    {}", krate.doc.dimmed());
        }
    }
    println!();
}

/// Interactive search mode
pub fn interactive_search(ctx: &SearchContext) -> Result<()> {
    println!("{}", "╔═══════════════════════════════════════════╗".cyan());
    println!("{}", "║   Documentation Index Search              ║".cyan());
    println!("{}", "╚═══════════════════════════════════════════╝".cyan());
    println!();
    print_help();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{} ", "docidx>".blue().bold());
        stdout.flush()?;

        let Some(input) = lines.next() else {
            println!();
            break;
        };
        let input = input?;
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let (command, rest) = match input.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };

        let outcome = match command {
            "quit" | "exit" | "q" => {
                println!("Goodbye! 👋");
                break;
            }
            "help" | "?" => {
                print_help();
                Ok(())
            }
            "crates" => {
                list_crates(ctx.index);
                Ok(())
            }
            "tree" => show_tree(ctx.index, (!rest.is_empty()).then_some(rest)),
            "show" if rest.is_empty() => Err(anyhow!("Usage: show <path>")),
            "show" => show_item(ctx, rest),
            "search" if rest.is_empty() => Err(anyhow!("Usage: search <query>")),
            "search" => search(ctx, rest, &[], None, false),
            // Default to search
            _ => search(ctx, input, &[], None, false),
        };

        if let Err(e) = outcome {
            println!("{} {}", "❌".red(), e);
        }
        println!();
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  {} <query>   - Search names, paths or signatures", "search".green());
    println!("  {} <path>      - Show one item by full path", "show".green());
    println!("  {} [crate]     - Show the item tree", "tree".green());
    println!("  {}           - List crates", "crates".green());
    println!("  {}             - Exit", "quit".green());
    println!();
    println!("Query forms:");
    println!("  {}", "name, path::to::name, \"exact\"".yellow());
    println!("  {}", "fn:name, struct:name, field:name".yellow());
    println!("  {}", "Input, Other -> Output".yellow());
    println!();
}

fn print_suggestions(index: &SearchIndex, name: &str) {
    if name.is_empty() {
        return;
    }
    let suggestions = query::suggest(index, name);
    if suggestions.is_empty() {
        return;
    }
    println!("{} Did you mean one of these?\n", "💡".cyan());
    for suggestion in suggestions {
        println!("  {} {}", "•".cyan(), suggestion.green());
    }
}

/// Display one search result
fn display_hit(ctx: &SearchContext, hit: &SearchHit) {
    let marker = match hit.match_kind {
        MatchKind::Exact => "▸".green(),
        MatchKind::Prefix | MatchKind::Substring => "▸".cyan(),
        MatchKind::Fuzzy => "▸".yellow(),
        MatchKind::Signature => "ƒ".cyan(),
    };
    let deprecated_marker = if hit.deprecated {
        format!(" {}", "[DEPRECATED]".red())
    } else {
        String::new()
    };

    println!(
        "  {} {} {}{}",
        marker,
        hit.path.bold(),
        format!("({})", hit.kind).dimmed(),
        deprecated_marker
    );
    if let Some(signature) = &hit.signature {
        println!("      {}", ctx.signature(signature));
    }
    if ctx.config.show_descriptions && !hit.description.is_empty() {
        println!("      {}", strip_tags(&hit.description).dimmed());
    }
}

/// Display detailed information about an item and its children
fn display_item(ctx: &SearchContext, krate: &CrateIndex, idx: usize) {
    let item = &krate.items[idx];

    println!();
    println!("{}", "╔═══════════════════════════════════════════╗".cyan());
    println!(
        "║ {} {}: {}",
        "📦".cyan(),
        item.ty.to_string().yellow(),
        krate.full_path(idx).green().bold()
    );
    println!("{}", "╚═══════════════════════════════════════════╝".cyan());
    println!();

    if item.deprecated {
        println!("{}\n", "[DEPRECATED]".red().bold());
    }
    if let Some(signature) = krate.render_signature(idx) {
        println!("  {}\n", ctx.signature(&signature));
    }
    if !item.desc.is_empty() {
        println!("{}\n", strip_tags(&item.desc));
    }
    if let Some(disambiguator) = &item.disambiguator {
        println!("{} {}\n", "impl:".bold(), disambiguator.dimmed());
    }

    let Some(entry) = krate.path_entry_for(idx) else {
        return;
    };
    let children: Vec<_> = krate.children(entry).collect();
    if children.is_empty() {
        return;
    }

    println!("{} {} member(s):", "Members:".bold(), children.len());
    println!();
    for (child_idx, child) in children {
        println!(
            "  {} {} {}",
            "▸".cyan(),
            child.name.yellow().bold(),
            format!("({})", child.ty).dimmed()
        );
        if let Some(signature) = krate.render_signature(child_idx) {
            println!("      {}", ctx.signature(&signature));
        }
        if ctx.config.show_descriptions && !child.desc.is_empty() {
            println!("      {}", strip_tags(&child.desc).dimmed());
        }
    }
    println!();
}

/// Descriptions are HTML fragments; drop the tags and decode common entities
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
