use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Semantic search over the recipe index
    Search {
        /// Free-text query, e.g. "quick vegan dinner"
        query: String,

        /// Number of results
        #[clap(short, long)]
        k: Option<usize>,

        /// Keep recipes with any of these tags (comma separated)
        #[clap(short, long)]
        tags: Option<String>,

        /// Drop recipes containing any of these ingredients (comma separated)
        #[clap(short, long)]
        exclude: Option<String>,

        /// Keep only recipes containing all of these ingredients (comma separated)
        #[clap(short, long)]
        include: Option<String>,

        /// Suppress results with near-identical titles
        #[clap(short, long, default_value = "false")]
        diverse: bool,
    },

    /// Find recipes that use every listed ingredient
    Ingredients {
        /// Comma separated ingredient list
        ingredients: String,

        /// Number of results
        #[clap(short, long)]
        k: Option<usize>,
    },

    /// Recipes similar to an indexed recipe
    Similar {
        /// Recipe id
        id: String,

        /// Number of results
        #[clap(short, long)]
        k: Option<usize>,
    },

    /// Show index statistics
    Stats {},
}
