use clap::{Parser, Subcommand};

use morph_cli::commands::{align_ops, config_ops, model_ops, pipeline_ops};

#[derive(Parser)]
#[command(name = "morphtool", about = "Morphological segmentation and labelling")]
struct Cli {
    /// Settings TOML replacing the built-in defaults
    #[arg(long, global = true)]
    config: Option<String>,
    /// Log debug output from the pipeline to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train segmenter and labeller, then print predictions for each word
    Run {
        /// Annotated training corpus
        #[arg(long)]
        train: String,
        /// Held-out corpus; records may omit segments and labels
        #[arg(long)]
        test: Option<String>,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Train a segmenter and save it
    Train {
        /// Annotated training corpus
        #[arg(long)]
        train: String,
        /// Output model file
        #[arg(short, long)]
        output: String,
    },
    /// Segment words with a saved model
    Segment {
        /// Model file written by `train`
        #[arg(short, long)]
        model: String,
        /// Words to segment
        #[arg(required = true)]
        words: Vec<String>,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the edit operations turning one word into another
    Align {
        origin: String,
        target: String,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Settings file operations
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the default settings TOML
    Export,
    /// Validate a settings TOML file
    Validate {
        /// Path to the settings file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();
    morph_cli::init_tracing(cli.verbose);
    config_ops::init_settings(cli.config.as_deref());

    match cli.command {
        Command::Run { train, test, json } => pipeline_ops::run(&train, test.as_deref(), json),
        Command::Train { train, output } => model_ops::train(&train, &output),
        Command::Segment { model, words, json } => model_ops::segment(&model, &words, json),
        Command::Align {
            origin,
            target,
            json,
        } => align_ops::align(&origin, &target, json),
        Command::Settings { action } => match action {
            SettingsAction::Export => config_ops::settings_export(),
            SettingsAction::Validate { file } => config_ops::settings_validate(&file),
        },
    }
}
