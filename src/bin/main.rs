//! Content Compiler CLI
//!
//! Batch front end for the model, atlas and shader compilers.

use clap::{Parser, Subcommand};
use content_compiler::build::{BuildContext, CancelToken, CollectingRegistrar, ParamValue, ParameterBag};
use content_compiler::{AtlasCompiler, ModelCompiler, ShaderCompiler, SourceScanService};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "content-compiler")]
#[command(author, version, about = "Compile game content into binary runtime assets", long_about = None)]
struct Cli {
    /// Root folder for authoring-time content
    #[arg(short, long, default_value = ".")]
    content_root: PathBuf,

    /// Output folder for compiled binaries
    #[arg(short, long, default_value = "build")]
    output_root: PathBuf,

    /// Build parameters as "Name=value" pairs (repeatable)
    #[arg(short, long, value_parser = parse_parameter)]
    param: Vec<(String, ParamValue)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a scene interchange document into a binary model
    Model {
        /// Scene document path, relative to the content root
        input: PathBuf,
    },

    /// Pack an atlas manifest into a binary atlas plus sheet images
    Atlas {
        /// Manifest path, relative to the content root
        input: PathBuf,
    },

    /// Compile a shader descriptor into a binary shader
    Shader {
        /// Descriptor path, relative to the content root
        input: PathBuf,
    },
}

fn parse_parameter(s: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid parameter '{}'. Use Name=value", s))?;

    // Infer the declared type from the literal's shape.
    let value = if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        ParamValue::Bool(value.eq_ignore_ascii_case("true"))
    } else if let Ok(int) = value.parse::<i64>() {
        ParamValue::Int(int)
    } else if let Ok(float) = value.parse::<f32>() {
        ParamValue::Float(float)
    } else {
        ParamValue::Text(value.to_string())
    };
    Ok((key.to_string(), value))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut params = ParameterBag::new();
    for (key, value) in cli.param {
        params.set(key, value);
    }

    let mut registrar = CollectingRegistrar::default();
    let asset_path = match &cli.command {
        Commands::Model { input } | Commands::Atlas { input } | Commands::Shader { input } => {
            input.clone()
        }
    };
    let mut ctx = BuildContext {
        asset_path,
        content_root: cli.content_root,
        output_root: cli.output_root,
        params,
        registrar: &mut registrar,
        cancel: CancelToken::new(),
    };

    match cli.command {
        Commands::Model { input } => {
            ModelCompiler::process(&mut ctx)?;
            println!("compiled model: {}", input.display());
        }
        Commands::Atlas { input } => {
            AtlasCompiler::process(&mut ctx)?;
            println!("compiled atlas: {}", input.display());
        }
        Commands::Shader { input } => {
            let mut service = SourceScanService;
            ShaderCompiler::process(&mut ctx, &mut service)?;
            println!("compiled shader: {}", input.display());
        }
    }

    for path in &registrar.paths {
        println!("referenced input: {}", path.display());
    }
    Ok(())
}
