use anyhow::{Context, Result};
use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct ContractArgs {
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

/// Prints the JSON schema of the `ask` response.
pub fn run(args: &ContractArgs) -> Result<()> {
    let schema = crate::models::json_schema().context("failed to generate response schema")?;
    let encoded = if args.pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .context("failed to encode response schema")?;
    println!("{encoded}");
    Ok(())
}
