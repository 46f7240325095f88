use colored::Colorize;
use issue_semsearch::embeddings::EmbeddingGenerator;
use issue_semsearch::error::{Result, SemSearchError};
use issue_semsearch::search::{authorize_search, DisplayResult, SemanticSearchService};
use issue_semsearch::Config;

use super::{current_thread_runtime, load_catalog, open_store};

pub fn cmd_search(
    config: &Config,
    query: &str,
    as_login: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    if limit == Some(0) {
        return Err(SemSearchError::Config("--limit must be at least 1".into()));
    }

    let catalog = load_catalog(config)?;
    let principal = catalog.principal(as_login)?.clone();
    authorize_search(config.settings.enabled, &principal)?;

    if query.trim().is_empty() {
        return print_results(&[], query, json);
    }

    let rt = current_thread_runtime()?;
    let outcome = EmbeddingGenerator::from_config(config).and_then(|generator| {
        let service = SemanticSearchService::new(
            generator,
            open_store(config)?,
            catalog,
            config.settings.enabled,
            config.settings.search_limit,
        );
        rt.block_on(service.search(query, &principal, limit))
    });

    let results = match outcome {
        Ok(results) => results,
        // Shown once as a notice; the search itself just has no results
        Err(e) if e.is_embedding() => {
            println!("{} {}", "Notice:".yellow().bold(), e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    print_results(&results, query, json)
}

fn print_results(results: &[DisplayResult], query: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No matching issues found.".yellow());
        return Ok(());
    }

    println!(
        "{} Semantic search results for '{}':\n",
        "Search".green().bold(),
        query
    );
    for result in results {
        print_result(result);
    }

    Ok(())
}

fn print_result(result: &DisplayResult) {
    println!(
        "  {} {} #{}: {} ({:.1}%)",
        ">".green(),
        result.tracker_name.cyan(),
        result.issue_id,
        result.subject.bold(),
        result.similarity_score * 100.0
    );
    println!(
        "    {} | {} | {} | by {}{}",
        result.project_name,
        result.status_name,
        result.priority_name,
        result.author_name,
        result
            .assigned_to_name
            .as_ref()
            .map(|name| format!(", assigned to {}", name))
            .unwrap_or_default()
    );
    if let Some(description) = result.description.as_deref().filter(|d| !d.trim().is_empty()) {
        println!("    {}", truncate_text(description, 150).dimmed());
    }
    println!(
        "    {}\n",
        format!("updated {}", result.updated_on.format("%Y-%m-%d %H:%M")).dimmed()
    );
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
