use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use cadastro_core::config::{expand_path, Config, LogFormat, LoggingConfig};
use cadastro_core::reference::ReferenceModel;
use cadastro_core::types::ProcessingResult;
use cadastro_pipeline::Engine;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

/// Reorganizes SICAR/CAR shapefile exports into one layer per theme.
#[derive(Parser, Debug)]
#[command(name = "cadastro", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a nested archive, a folder of layer archives or a folder of loose shapefiles.
    Process {
        #[arg(value_parser = expanded_path)]
        input: PathBuf,

        /// Root for the output folder. Defaults to the input's parent directory.
        #[arg(long, short, value_parser = expanded_path)]
        output: Option<PathBuf>,

        /// Treat the input as an upload and write `{receipt}_processado.zip` instead of a folder.
        #[arg(long, default_value_t = false)]
        zip: bool,

        /// Skip `.sld` styles.
        #[arg(long, default_value_t = false)]
        no_styles: bool,

        /// Print the run report as JSON on stdout.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the recognized themes, optionally for a single group key.
    Themes {
        #[arg(long)]
        group: Option<String>,
    },
}

/// `~` and `${VAR}` are expanded so quoted paths behave like shell ones.
fn expanded_path(raw: &str) -> Result<PathBuf, String> {
    Ok(expand_path(raw))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Console => builder.init(),
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn main() -> anyhow::Result<()> {
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    init_tracing(&config.logging()?);
    let cli = Cli::parse();

    match cli.command {
        Command::Process { input, output, zip, no_styles, json } => {
            let mut engine_config = config.engine()?;
            if no_styles {
                engine_config.include_styles = false;
            }
            let include_styles = engine_config.include_styles;
            let engine = Engine::new(engine_config)?;

            let pb = spinner(format!("Processing {}", input.display()));
            let outcome = if zip {
                process_upload(&engine, &input, output.as_deref(), include_styles)
            } else {
                engine.process_path(&input, output.as_deref()).map_err(anyhow::Error::from)
            };
            pb.finish_and_clear();

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    std::process::exit(1);
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
        }
        Command::Themes { group } => print_themes(group.as_deref())?,
    }
    Ok(())
}

fn process_upload(engine: &Engine, input: &Path, output: Option<&Path>, include_styles: bool) -> anyhow::Result<ProcessingResult> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let file_name = input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "input.zip".to_string());
    let packaged = engine.process_upload(&bytes, &file_name, include_styles)?;
    let dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().filter(|p| !p.as_os_str().is_empty()).map_or_else(|| PathBuf::from("."), Path::to_path_buf),
    };
    fs::create_dir_all(&dir)?;
    let target = dir.join(&packaged.file_name);
    fs::write(&target, &packaged.bytes).with_context(|| format!("writing {}", target.display()))?;
    println!("📦 Wrote {} ({} bytes)", target.display(), packaged.bytes.len());
    Ok(packaged.result)
}

fn print_summary(result: &ProcessingResult) {
    println!("\n✅ Processing completed for receipt {}", result.receipt);
    if let Some(dir) = &result.output_dir {
        println!("📁 Output: {}", dir.display());
    }
    println!("📊 {} theme layer(s), {} feature(s)", result.themes_written, result.feature_total);
    for path in &result.generated {
        println!("   • {}", path.display());
    }
    if !result.warnings.is_empty() {
        println!("\n⚠️  {} warning(s)", result.warnings.len());
        for w in &result.warnings {
            println!("   {}", w);
        }
    }
    if !result.errors.is_empty() {
        println!("\n❗ {} theme(s) not written", result.errors.len());
        for e in &result.errors {
            println!("   {}", e);
        }
    }
}

fn print_themes(group: Option<&str>) -> anyhow::Result<()> {
    let model = ReferenceModel::standard();
    let groups: Vec<_> = match group {
        Some(key) => vec![model.group(key).with_context(|| format!("unknown group '{}'", key))?],
        None => model.groups().to_vec(),
    };
    for g in groups {
        println!("{} ({} themes)", model.folder_name(g), g.themes.len());
        for t in g.themes {
            println!("   {:<8} {:<60} -> {}", t.kind.as_str(), t.label, t.output_name);
        }
    }
    let counts = model.theme_counts();
    println!("\n📊 {} themes in {} groups", counts.total, counts.per_group.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_paths_expand_home_and_variables() {
        let home = PathBuf::from(std::env::var("HOME").expect("HOME"));
        let cli = Cli::try_parse_from(["cadastro", "process", "~/SICAR/car.zip", "--output", "${HOME}/saida"]).expect("parse");
        let Command::Process { input, output, .. } = cli.command else { panic!("process expected") };
        assert_eq!(input, home.join("SICAR/car.zip"));
        assert_eq!(output, Some(home.join("saida")));
    }
}
