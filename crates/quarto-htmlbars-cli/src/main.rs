//! htmlbars CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "htmlbars")]
#[command(version)]
#[command(about = "Compile and render HTML templates with mustache expressions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Render a template against a JSON context
    Render {
        /// Template file ('-' for stdin)
        template: String,

        /// JSON file providing the context (defaults to an empty object)
        #[arg(short = 'd', long)]
        data: Option<String>,

        /// Write output to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<String>,

        /// Emit only the rendered markup, without the surrounding HTML page
        #[arg(long)]
        fragment_only: bool,
    },

    /// Parse a template and print its syntax tree as JSON
    Parse {
        /// Template file ('-' for stdin)
        template: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "htmlbars=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            data,
            output,
            fragment_only,
        } => commands::render::execute(commands::render::RenderArgs {
            template,
            data,
            output,
            fragment_only,
        }),
        Commands::Parse { template } => commands::parse::execute(&template),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_arguments() {
        let cli = Cli::try_parse_from([
            "htmlbars",
            "render",
            "page.hbs",
            "--data",
            "context.json",
            "-o",
            "out.html",
            "--fragment-only",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Render {
                template: "page.hbs".to_string(),
                data: Some("context.json".to_string()),
                output: Some("out.html".to_string()),
                fragment_only: true,
            }
        );
    }

    #[test]
    fn test_render_defaults() {
        let cli = Cli::try_parse_from(["htmlbars", "render", "-"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Render {
                template: "-".to_string(),
                data: None,
                output: None,
                fragment_only: false,
            }
        );
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from(["htmlbars", "parse", "page.hbs"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Parse {
                template: "page.hbs".to_string()
            }
        );
    }

    #[test]
    fn test_template_is_required() {
        assert!(Cli::try_parse_from(["htmlbars", "render"]).is_err());
        assert!(Cli::try_parse_from(["htmlbars"]).is_err());
    }
}
