//! Image Chat - ask a hosted multimodal model about an image
//!
//! This is the CLI entry point for the image-chat tool.
//! Run with: cargo run --bin image-chat -- [--image PATH | --url URL] [PROMPT...]

use image_chat::attachment::{fetch_url, load_path, ImageError, SelectedImage};
use image_chat::chat::{ChatSession, InstructionPreset, DEFAULT_EXPORT_FILE};
use image_chat::model::{ModelClient, ModelError};
use image_chat::settings::{api_key_from_env, AppSettings};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
Commands:
  /image <path>        select an image file (PNG or JPEG)
  /url <url>           fetch an image from a URL
  /clear               clear the conversation
  /export [path]       save the conversation as JSON
  /system [text]       show or set the system instruction
  /preset <name>       apply a preset (professional, friendly, creative, educational)
  /reset-system        remove the system instruction
  /model               show the selected model
  /help                show this help
  quit | exit          leave";

/// Command line options.
#[derive(Debug, Default)]
struct Options {
    image: Option<String>,
    url: Option<String>,
    prompt: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--image" => {
                options.image = Some(args.next().ok_or_else(|| anyhow::anyhow!("--image needs a path"))?)
            }
            "--url" => {
                options.url = Some(args.next().ok_or_else(|| anyhow::anyhow!("--url needs a URL"))?)
            }
            _ => options.prompt.push(arg),
        }
    }

    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let options = parse_args(env::args().skip(1))?;

    let settings = AppSettings::load_with_env();
    let api_key = api_key_from_env();
    let client = ModelClient::new(settings.model_config(api_key.clone()));
    let http = reqwest::Client::new();

    println!("🤖 Image Chat - ask questions about an image");
    println!("================================================");
    println!("API: {}", settings.base_url);
    if !settings.preferred_model.is_empty() {
        println!("Preferred model: {}", settings.preferred_model);
    }
    println!(
        "Retry: max {} attempts, {}s delay",
        settings.max_attempts, settings.retry_delay
    );
    println!("Images are scaled to at most {}px", settings.max_image_dim);
    if api_key.is_none() {
        println!("⚠️ API_KEY is not set; replies will fail until it is configured");
    }
    println!("================================================\n");

    let mut session = ChatSession::new();

    if let Some(path) = options.image {
        attach(&mut session, load_path(&path).await);
    }
    if let Some(url) = options.url {
        attach(&mut session, fetch_url(&http, &url).await);
    }

    // One-shot mode when a prompt is given on the command line
    if !options.prompt.is_empty() {
        let prompt = options.prompt.join(" ");
        println!("💬 You: {}\n", prompt);
        ask(&mut session, &client, &prompt).await;
        return Ok(());
    }

    println!("Interactive mode. Ask a question and press Enter.");
    println!("Type /help for commands, 'quit' or 'exit' to exit.\n");

    let stdin = io::stdin();
    loop {
        print!("💬 You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "exit" {
            println!("Goodbye! 👋");
            break;
        }

        if let Some(command) = input.strip_prefix('/') {
            let (name, arg) = command
                .split_once(char::is_whitespace)
                .map(|(n, a)| (n, a.trim()))
                .unwrap_or((command, ""));
            run_command(&mut session, &http, name, arg).await;
            continue;
        }

        ask(&mut session, &client, input).await;
    }

    Ok(())
}

/// Handle a slash command.
async fn run_command(session: &mut ChatSession, http: &reqwest::Client, name: &str, arg: &str) {
    match name {
        "image" if !arg.is_empty() => attach(session, load_path(arg).await),
        "url" if !arg.is_empty() => attach(session, fetch_url(http, arg).await),
        "clear" => {
            session.clear();
            println!("🗑️ Chat cleared\n");
        }
        "export" => {
            let path = if arg.is_empty() {
                PathBuf::from(DEFAULT_EXPORT_FILE)
            } else {
                PathBuf::from(arg)
            };
            match session.export_to_file(&path) {
                Ok(path) => println!("💾 Saved {}\n", path.display()),
                Err(e) => println!("⚠️ {}\n", e),
            }
        }
        "system" if arg.is_empty() => {
            if session.system_instruction().is_empty() {
                println!("🎭 No system instruction\n");
            } else {
                println!("🎭 {}\n", session.system_instruction());
            }
        }
        "system" => {
            let notice = session.set_system_instruction(arg);
            println!("🎭 System instruction set");
            print_notice(notice);
        }
        "preset" => match InstructionPreset::from_name(arg) {
            Some(preset) => {
                let notice = session.apply_preset(preset);
                println!("🎭 Applied {} preset", preset);
                print_notice(notice);
            }
            None => {
                let names: Vec<&str> = InstructionPreset::ALL.iter().map(|p| p.name()).collect();
                println!("⚠️ Unknown preset '{}'. Available: {}\n", arg, names.join(", "));
            }
        },
        "reset-system" => {
            session.reset_system_instruction();
            println!("🔄 System instruction removed\n");
        }
        "model" => match session.selected_model() {
            Some(model) => println!("🤖 Model: {}\n", model.short_name()),
            None => println!("🤖 No model selected yet; one is picked on the first question\n"),
        },
        "help" => println!("{}\n", HELP),
        _ => println!("⚠️ Unknown command. Type /help for the list.\n"),
    }
}

/// Apply an image load result, keeping the previous image on failure.
fn attach(session: &mut ChatSession, loaded: Result<SelectedImage, ImageError>) {
    match session.attach_image(loaded) {
        Ok(image) => println!(
            "🖼️ Image selected: {} ({}x{})\n",
            image.source,
            image.width(),
            image.height()
        ),
        Err(e) => {
            let kept = if session.image().is_some() {
                " (keeping the previous image)"
            } else {
                ""
            };
            println!("⚠️ {}{}\n", e, kept);
        }
    }
}

fn print_notice(notice: Option<&str>) {
    match notice {
        Some(notice) => println!("{}\n", notice),
        None => println!(),
    }
}

/// Run one turn and print the reply or the error.
async fn ask(session: &mut ChatSession, client: &ModelClient, prompt: &str) {
    println!("🤔 Thinking...");

    let turn = session.begin_turn(prompt);
    let outcome = turn.run(client).await;

    if outcome.newly_selected {
        if let Some(model) = &outcome.model {
            println!("🤖 Using model: {}", model.short_name());
        }
    }

    match session.finish_turn(outcome) {
        Ok(reply) => println!("\n🤖 Assistant: {}\n", reply.content),
        Err(e) => print_error(&e),
    }
}

fn print_error(error: &ModelError) {
    eprintln!("\n❌ Error: {}", error);
    if error.is_throttled() {
        eprintln!("   The API is rate limiting requests; wait a moment and try again.");
    }
    eprintln!();
}
