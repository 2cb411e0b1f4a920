use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use stagehand::TemplateRegistry;

#[derive(Parser)]
#[command(name = "stagehand-check")]
#[command(about = "Validate and render stagehand template documents", long_about = None)]
struct Cli {
    /// YAML template document.
    #[arg(short, long, default_value = "templates.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every template and list the registered names
    Check,
    /// Render one template to stdout
    Render {
        /// Registered template name
        name: String,
        /// Template data as JSON
        #[arg(short, long, default_value = "null")]
        data: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut registry = TemplateRegistry::new();
    registry.parse_config_file(&cli.config)?;

    match cli.command {
        Commands::Check => {
            for name in registry.names() {
                println!("{}", name);
            }
        }
        Commands::Render { name, data } => {
            let data: Value = serde_json::from_str(&data)?;
            let templates = registry.freeze();
            let mut stdout = std::io::stdout().lock();
            templates.execute(&name, &mut stdout, &data)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
