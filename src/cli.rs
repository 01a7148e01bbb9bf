use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use volcano_nodes::services::display::DEFAULT_MAX_DISPLAY_LENGTH;
use volcano_nodes::{ApiMode, SplitMethod, MAX_OUTPUT_SLOTS};

#[derive(Parser)]
#[command(name = "volcano")]
#[command(about = "Text splitting and multimodal prompting for the Volcano Engine LLM API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split text into bounded segments
    Split(SplitArgs),

    /// Render a single segment with statistics
    Display(DisplayArgs),

    /// Send a text or multimodal prompt
    Chat(ChatArgs),

    /// Test the connection and credentials
    Check(CheckArgs),

    /// List the registered nodes
    Nodes,
}

#[derive(Args)]
pub struct SplitArgs {
    /// Text to split (omit to use --file)
    #[arg(value_name = "TEXT", required_unless_present = "file")]
    pub text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, value_name = "FILE", conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Split method: paragraph, sentence, custom or fixed (unknown names fall back to paragraph)
    #[arg(short, long, default_value = "paragraph", value_parser = parse_split_method)]
    pub method: SplitMethod,

    /// Maximum number of segments to keep
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u16).range(2..=50))]
    pub max_segments: u16,

    /// Separator used by the custom method
    #[arg(long, default_value = "\n\n")]
    pub separator: String,

    /// Characters per segment for the fixed method
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u32).range(1..=5000))]
    pub chars_per_segment: u32,

    /// Keep segments that are blank after trimming
    #[arg(long)]
    pub keep_empty: bool,

    /// Print the result as JSON instead of the preview
    #[arg(long)]
    pub json: bool,

    /// Print only the segment at this output slot (1-based, empty when unused)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=MAX_OUTPUT_SLOTS as i64))]
    pub segment: Option<u16>,
}

#[derive(Args)]
pub struct DisplayArgs {
    /// Segment text
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Hide the statistics block
    #[arg(long)]
    pub no_stats: bool,

    /// Maximum characters to display
    #[arg(long, default_value_t = DEFAULT_MAX_DISPLAY_LENGTH as u32, value_parser = clap::value_parser!(u32).range(100..=10000))]
    pub max_display_length: u32,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// OpenAI-compatible chat completions
    Openapi,
    /// Vendor REST endpoint
    Rest,
}

impl From<ModeArg> for ApiMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Openapi => ApiMode::OpenApi,
            ModeArg::Rest => ApiMode::Rest,
        }
    }
}

#[derive(Args)]
pub struct ClientArgs {
    /// API mode
    #[arg(long, value_enum, default_value = "openapi")]
    pub mode: ModeArg,

    /// Endpoint id (OpenAPI mode model)
    #[arg(long, env = "ARK_ENDPOINT_ID", default_value = "")]
    pub endpoint_id: String,

    /// API key
    #[arg(long, env = "ARK_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Region used to derive the base URL
    #[arg(long, default_value = "cn-beijing")]
    pub region: String,

    /// Custom base URL, takes priority over --region
    #[arg(long, default_value = "")]
    pub base_url: String,
}

#[derive(Args)]
pub struct ChatArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Prompt text
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// System prompt
    #[arg(long, default_value = "")]
    pub system: String,

    /// Image URL, data URI or file path (repeatable)
    #[arg(long = "image", value_name = "IMAGE")]
    pub images: Vec<String>,

    /// Video URL (repeatable)
    #[arg(long = "video", value_name = "VIDEO")]
    pub videos: Vec<String>,

    /// Model override; required in REST mode
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..=4096))]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.7, value_parser = parse_temperature)]
    pub temperature: f32,

    #[arg(long, default_value_t = 0.9, value_parser = parse_top_p)]
    pub top_p: f32,

    /// Stop sequence (repeatable)
    #[arg(long = "stop", value_name = "TEXT")]
    pub stop: Vec<String>,

    /// Print the response as it streams in
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub client: ClientArgs,
}

fn parse_split_method(value: &str) -> Result<SplitMethod, String> {
    Ok(SplitMethod::parse_lenient(value))
}

fn parse_unit_range(value: &str, max: f32) -> Result<f32, String> {
    let parsed: f32 = value.parse().map_err(|e| format!("{}", e))?;
    if !(0.0..=max).contains(&parsed) {
        return Err(format!("value must be between 0 and {}", max));
    }
    Ok(parsed)
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    parse_unit_range(value, 2.0)
}

fn parse_top_p(value: &str) -> Result<f32, String> {
    parse_unit_range(value, 1.0)
}
