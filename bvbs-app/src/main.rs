use std::path::PathBuf;

use anyhow::Result;
use bvbs_config::{AppConfig, ConfigError};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;

use commands::{EncodeArgs, SegmentArg};

#[derive(Parser)]
#[command(name = "bvbs")]
#[command(about = "Parse, verify and write BVBS rebar bending records", long_about = None)]
struct Cli {
    /// Explicit configuration file (overrides BVBS_CONFIG and ./config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of a file with metadata, errors and warnings
    Parse {
        file: PathBuf,
        /// Print the parsed entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the embedded checksum of every record
    Verify { file: PathBuf },
    /// Encode a shape into a checksummed record
    Encode {
        /// Bar diameter (mm)
        #[arg(long)]
        diameter: f64,
        /// Bending roll diameter (mm); defaults to 4 × bar diameter
        #[arg(long)]
        roll_diameter: Option<f64>,
        #[arg(long, default_value_t = 1)]
        quantity: i64,
        #[arg(long, default_value = "")]
        project: String,
        #[arg(long, default_value = "")]
        plan: String,
        #[arg(long, default_value = "")]
        order: String,
        #[arg(long, default_value = "")]
        position: String,
        #[arg(long, default_value = "")]
        grade: String,
        #[arg(long, default_value = "")]
        remark: String,
        /// Leg as LEN[:ANGLE[:L|R[:RADIUS]]]; repeat once per leg
        #[arg(long = "segment", required = true)]
        segments: Vec<SegmentArg>,
        /// Output variant; defaults to the configured one
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
        /// Write the record to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Reconstruct the outline of every previewable record
    Geometry {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Abs,
    Legacy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config);
    init_logging(&config);
    info!("启动 BVBS 工具");

    match cli.command {
        Commands::Parse { file, json } => commands::parse(&file, json),
        Commands::Verify { file } => commands::verify(&file),
        Commands::Encode {
            diameter,
            roll_diameter,
            quantity,
            project,
            plan,
            order,
            position,
            grade,
            remark,
            segments,
            variant,
            output,
        } => commands::encode(
            &config,
            EncodeArgs {
                diameter,
                roll_diameter,
                quantity,
                project,
                plan,
                order,
                position,
                grade,
                remark,
                segments,
                variant: variant.map(|variant| match variant {
                    VariantArg::Abs => bvbs_io::FormatVariant::Abs,
                    VariantArg::Legacy => bvbs_io::FormatVariant::Legacy,
                }),
                output,
            },
        ),
        Commands::Geometry { file, json } => commands::geometry(&config, &file, json),
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

/// 日志写到标准错误，标准输出只留给命令结果。
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
