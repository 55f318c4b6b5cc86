use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod recipes;
mod search;
mod semantic;
#[cfg(test)]
mod tests;

use config::Config;
use search::{SearchEngine, SearchFilters};

/// Split a comma separated list into trimmed, non-empty items.
pub fn parse_list(list: String) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("RECIPE_SEARCH_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .map_err(|e| anyhow::anyhow!("could not determine home directory: {e:?}"))?
        .context("home directory path is empty")?;

    Ok(home.join(".local/share/recipe-search"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config = Config::load_with(&base_path()?)?;
    let engine = SearchEngine::from_config(&config)?;

    match args.command {
        cli::Command::Search {
            query,
            k,
            tags,
            exclude,
            include,
            diverse,
        } => {
            let filters = SearchFilters::new()
                .with_tags(tags.map(parse_list).unwrap_or_default())
                .with_excluded_ingredients(exclude.map(parse_list).unwrap_or_default())
                .with_required_ingredients(include.map(parse_list).unwrap_or_default());

            let k = k.unwrap_or(engine.default_k());
            let results = engine.search(&query, k, Some(&filters), diverse);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        cli::Command::Ingredients { ingredients, k } => {
            let ingredients = parse_list(ingredients);
            let k = k.unwrap_or(engine.default_k());
            let results = engine.search_by_ingredients(&ingredients, k);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        cli::Command::Similar { id, k } => {
            let results = engine.get_similar_recipes(&id, k.unwrap_or(engine.default_k()));
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        cli::Command::Stats {} => match engine.stats() {
            Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
            None => println!("{{}}"),
        },
    }

    Ok(())
}
