mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{ChatArgs, CheckArgs, Cli, ClientArgs, Commands, DisplayArgs, SplitArgs};
use futures::StreamExt;
use std::io::Write;
use tracing::{error, info};
use volcano_nodes::{
    format_segment, ChatClient, ChatClientConfig, ContentItem, GenerationParams, ImageRef,
    MessageAssembler, NodeRegistry, SplitConfig, TextSplitter, MAX_OUTPUT_SLOTS,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    volcano_nodes::init_tracing(cli.verbose)?;

    let registry = NodeRegistry::with_builtin_nodes();

    let result = match &cli.command {
        Commands::Split(args) => handle_split_command(args).await,
        Commands::Display(args) => handle_display_command(args),
        Commands::Chat(args) => handle_chat_command(args).await,
        Commands::Check(args) => handle_check_command(args).await,
        Commands::Nodes => handle_nodes_command(&registry),
    };

    if let Err(e) = result {
        error!("Operation failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn build_client(args: &ClientArgs) -> volcano_nodes::Result<ChatClient> {
    let config = ChatClientConfig::new(args.mode.into(), &args.api_key)
        .with_endpoint_id(&args.endpoint_id)
        .with_region(&args.region)
        .with_base_url(&args.base_url);

    ChatClient::new(config)
}

async fn handle_split_command(args: &SplitArgs) -> anyhow::Result<()> {
    let text = match (&args.file, &args.text) {
        (Some(path), _) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(text)) => text.clone(),
        (None, None) => String::new(),
    };

    let config = SplitConfig {
        method: args.method,
        max_segments: usize::from(args.max_segments),
        separator: args.separator.clone(),
        chars_per_segment: args.chars_per_segment as usize,
        remove_empty: !args.keep_empty,
    };

    let splitter = TextSplitter::new()?;
    let result = splitter.split_text(&text, &config);
    info!("Produced {} segments", result.segment_count);

    if let Some(slot) = args.segment {
        let outputs = result.outputs(MAX_OUTPUT_SLOTS);
        println!("{}", outputs[usize::from(slot) - 1]);
        return Ok(());
    }

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize split result")?;
        println!("{}", json);
    } else {
        println!("{}", result.preview);
    }

    Ok(())
}

fn handle_display_command(args: &DisplayArgs) -> anyhow::Result<()> {
    println!(
        "{}",
        format_segment(&args.text, !args.no_stats, args.max_display_length as usize)
    );
    Ok(())
}

async fn handle_chat_command(args: &ChatArgs) -> anyhow::Result<()> {
    let client = build_client(&args.client)?;

    let params = GenerationParams {
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        top_p: args.top_p,
        stop: if args.stop.is_empty() {
            None
        } else {
            Some(args.stop.clone())
        },
    };
    let model = args.model.as_deref();

    let text_only = args.images.is_empty() && args.videos.is_empty();
    let mut items = vec![ContentItem::Text(args.prompt.clone())];
    items.extend(
        args.images
            .iter()
            .cloned()
            .map(|image| ContentItem::Image(ImageRef::Reference(image))),
    );
    items.extend(args.videos.iter().cloned().map(ContentItem::Video));

    if args.stream {
        let messages = if text_only {
            MessageAssembler::build_text_messages(&args.prompt, &args.system)
        } else {
            MessageAssembler::build_messages(&items, &args.system)?
        };

        let mut stream = Box::pin(client.chat_stream(&messages, &params, model).await?);
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            write!(stdout, "{}", chunk.delta)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
        return Ok(());
    }

    let generation = if text_only {
        client
            .generate(&args.prompt, &args.system, &params, model)
            .await?
    } else {
        client
            .generate_multimodal(&items, &args.system, &params, model)
            .await?
    };

    println!("{}", generation.text);
    println!("{}", generation.info.to_json_pretty()?);
    Ok(())
}

async fn handle_check_command(args: &CheckArgs) -> anyhow::Result<()> {
    let client = build_client(&args.client)?;
    client.test_connection().await?;
    println!("Connected to {}", client.config().base_url);
    Ok(())
}

fn handle_nodes_command(registry: &NodeRegistry) -> anyhow::Result<()> {
    println!("=== Registered nodes ({}) ===", registry.len());
    for node in registry.iter() {
        println!("{:<26} {:<28} [{}]", node.name, node.display_name, node.category);
        println!("    {}", node.description);
    }
    Ok(())
}
