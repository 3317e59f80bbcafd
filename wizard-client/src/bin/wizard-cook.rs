use anyhow::{Context, Result};
use clap::Parser;
use wizard::{RecipeRequest, ReplyFormat};
use wizard_client::config::{ApiKeys, ProviderSettings};
use wizard_client::generation::{image_format, recipe_prompt};
use wizard_client::{providers, Provider, Wizard};

/// Cook up a recipe and a photo of it from a list of ingredients
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Ingredients to use, comma separated
    ingredients: String,
    /// Items to avoid due to sensitivities or allergies
    #[arg(long, default_value = "")]
    avoid: String,
    /// Dietary constraints, e.g. "vegan" or "gluten free"
    #[arg(long, default_value = "")]
    diet: String,
    /// Preferred cuisine
    #[arg(long, default_value = "")]
    cuisine: String,
    /// Time constraint, e.g. "under 30 minutes"
    #[arg(long, default_value = "")]
    time: String,
    /// Which provider to use: openai, bedrock or huggingface
    #[arg(short, long, default_value = "openai")]
    provider: Provider,
    /// Ask the model for JSON instead of labeled sections
    #[arg(long)]
    json: bool,
    /// YAML file with provider settings
    #[arg(short, long)]
    config: Option<String>,
    /// Where to save the photo, without extension
    #[arg(short, long, default_value = "dish")]
    output: String,
    /// Skip the photo
    #[arg(long)]
    no_image: bool,
    /// Dry run mode: print the prompt and stop
    #[arg(long)]
    dry: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let request = RecipeRequest {
        ingredients: args.ingredients,
        items_to_avoid: args.avoid,
        dietary_constraints: args.diet,
        cuisine: args.cuisine,
        time_constraint: args.time,
        format: if args.json {
            ReplyFormat::Json
        } else {
            ReplyFormat::Sections
        },
    };

    if args.dry {
        let prompt = recipe_prompt(&request);
        println!("{}", prompt.flattened());
        println!("Dry run mode enabled, skipping generation");
        return Ok(());
    }

    let settings = match &args.config {
        Some(path) => ProviderSettings::load(path).context("Loading provider settings")?,
        None => ProviderSettings::default(),
    };
    let generators = providers::connect(args.provider, &settings, &ApiKeys::from_env()).await?;
    let wizard = Wizard::from(generators);

    let (recipe, _) = wizard.write_recipe(&request).await?;
    println!("{}", recipe.to_markdown());

    if args.no_image {
        return Ok(());
    }
    let image = wizard.photograph(&recipe).await?;
    let extension = image_format(&image).map_or("img", |(_, ext)| ext);
    let path = format!("{}.{}", args.output, extension);
    std::fs::write(&path, &image).with_context(|| format!("Saving image to {path}"))?;
    tracing::info!("Saved image to {}", path);

    Ok(())
}
