use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use imaginify_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use imaginify_contracts::editor::{EditorSession, Outcome, SessionError, UploadTarget};
use imaginify_contracts::prompts::PromptRecall;
use imaginify_contracts::{ArtStyle, AspectRatio, EditorAction, EditorMode};
use imaginify_engine::{DownloadFormat, EngineConfig, ImaginifyEngine, JsonFilePromptStore};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(
    name = "imaginify",
    version,
    about = "Generate, edit, upscale, restyle and face-swap images"
)]
struct Cli {
    /// Data directory (prompt history, event log, downloads).
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Use the offline placeholder service instead of the Google API.
    #[arg(long, global = true)]
    dryrun: bool,
    /// Keep prompt history in memory only.
    #[arg(long, global = true)]
    no_persist: bool,
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat,
    Run(RunArgs),
    Prompts,
    Styles,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "1:1")]
    aspect: AspectRatio,
    #[arg(long)]
    style: Option<ArtStyle>,
    #[arg(long)]
    upscale: bool,
    #[arg(long, default_value = "png")]
    format: DownloadFormat,
    /// Where to write the result; defaults to `<out>/downloads`.
    #[arg(long)]
    download_dir: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("imaginify error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let config = engine_config(&cli);
    debug!(data_dir = %config.data_dir.display(), dryrun = config.dryrun, "configuration loaded");
    match cli.command {
        Command::Chat => {
            run_chat(config)?;
            Ok(0)
        }
        Command::Run(args) => run_once(config, args),
        Command::Prompts => {
            list_saved_prompts(&config);
            Ok(0)
        }
        Command::Styles => {
            print_styles();
            Ok(0)
        }
    }
}

fn engine_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(out) = cli.out.as_ref() {
        config.data_dir = out.clone();
    }
    config.events_path = cli.events.clone();
    config.dryrun = cli.dryrun;
    config.persist_prompts = !cli.no_persist;
    config
}

fn run_chat(config: EngineConfig) -> Result<()> {
    let mut engine = ImaginifyEngine::new(config)?;
    let mut aspect_ratio = AspectRatio::default();

    let stdin = io::stdin();
    let mut line = String::new();
    println!(
        "Imaginify chat started ({} service). Type /help for commands.",
        engine.service_name()
    );

    loop {
        print!("{}> ", engine.session().mode());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Plain text generates in generate mode and edits in edit mode.");
            }
            "prompt" => {
                let text = intent.prompt.clone().unwrap_or_default();
                let action = prompt_action(engine.session().mode(), text, aspect_ratio);
                let result = engine.run(action);
                report(&engine, result);
            }
            "generate" => {
                let action = EditorAction::Generate {
                    prompt: intent.arg_str("prompt").unwrap_or_default().to_string(),
                    aspect_ratio,
                };
                let result = engine.run(action);
                report(&engine, result);
            }
            "edit" => {
                let action = EditorAction::Edit {
                    instruction: intent.arg_str("prompt").unwrap_or_default().to_string(),
                };
                let result = engine.run(action);
                report(&engine, result);
            }
            "upscale" => {
                let result = engine.run(EditorAction::Upscale);
                report(&engine, result);
            }
            "style_transfer" => {
                let Some(raw) = intent.arg_str("style") else {
                    println!("/style requires a style name. Try /styles.");
                    continue;
                };
                match raw.parse::<ArtStyle>() {
                    Ok(style) => {
                        let result = engine.run(EditorAction::StyleTransfer { style });
                        report(&engine, result);
                    }
                    Err(err) => println!("{err}"),
                }
            }
            "replace_face" => {
                let result = engine.run(EditorAction::ReplaceFace);
                report(&engine, result);
            }
            "accept_preview" => match engine.accept_preview() {
                Ok(artifact) => {
                    println!("Face swap accepted ({}).", artifact.id());
                    println!("{}", status_line(engine.session()));
                }
                Err(err) => println!("{err}"),
            },
            "discard_preview" => match engine.discard_preview() {
                Ok(()) => println!("Face swap discarded."),
                Err(err) => println!("{err}"),
            },
            "undo" => match engine.undo() {
                Ok(true) => println!("{}", status_line(engine.session())),
                Ok(false) => println!("Nothing to undo."),
                Err(err) => println!("{err}"),
            },
            "redo" => match engine.redo() {
                Ok(true) => println!("{}", status_line(engine.session())),
                Ok(false) => println!("Nothing to redo."),
                Err(err) => println!("{err}"),
            },
            "upload" | "upload_face" => {
                let Some(path) = intent.arg_str("path") else {
                    println!("/{} requires a path", upload_command(&intent));
                    continue;
                };
                let target = if intent.action == "upload" {
                    UploadTarget::Target
                } else {
                    UploadTarget::SourceFace
                };
                let result = engine.upload_file(Path::new(path), target);
                report(&engine, result);
            }
            "go_to_prompt" => match engine.go_to_prompt() {
                Ok(()) => println!("Back to the prompt page."),
                Err(err) => println!("{err}"),
            },
            "clear_face" => match engine.clear_source_face() {
                Ok(()) => println!("Source face cleared."),
                Err(err) => println!("{err}"),
            },
            "set_aspect_ratio" => match intent.arg_str("aspect_ratio") {
                None => println!("Aspect ratio: {aspect_ratio}"),
                Some(raw) => match raw.parse::<AspectRatio>() {
                    Ok(parsed) => {
                        aspect_ratio = parsed;
                        println!("Aspect ratio set to {aspect_ratio}");
                    }
                    Err(err) => println!("{err}"),
                },
            },
            "set_mode" => match intent.arg_str("mode").map(str::parse::<EditorMode>) {
                None => println!("Mode: {}", engine.session().mode()),
                Some(Ok(mode)) => match engine.set_mode(mode) {
                    Ok(()) => println!("Mode set to {mode}"),
                    Err(err) => println!("{err}"),
                },
                Some(Err(err)) => println!("{err}"),
            },
            "download" => {
                let raw = intent.arg_str("format").unwrap_or("png");
                match raw.parse::<DownloadFormat>() {
                    Ok(format) => match engine.download(format, None) {
                        Ok(path) => println!("Saved {}", path.display()),
                        Err(err) => println!("Download failed: {err:#}"),
                    },
                    Err(err) => println!("{err}"),
                }
            }
            "list_prompts" => print_prompts(engine.session().prompts()),
            "recall" => {
                let prompts = engine.session().prompts();
                match recall_index(intent.arg_str("index"), prompts.len()) {
                    Ok(index) => {
                        let text = prompts.get(index).unwrap_or_default().to_string();
                        println!("Recalled: {text}");
                        let action = prompt_action(engine.session().mode(), text, aspect_ratio);
                        let result = engine.run(action);
                        report(&engine, result);
                    }
                    Err(message) => println!("{message}"),
                }
            }
            "list_styles" => print_styles(),
            "status" => println!("{}", status_line(engine.session())),
            "unknown" => {
                let command = intent.arg_str("command").unwrap_or_default();
                println!("Unknown command: /{command}. Type /help for commands.");
            }
            other => println!("Unhandled action: {other}"),
        }
    }

    Ok(())
}

fn run_once(config: EngineConfig, args: RunArgs) -> Result<i32> {
    let mut engine = ImaginifyEngine::new(config)?;
    engine.run(EditorAction::Generate {
        prompt: args.prompt,
        aspect_ratio: args.aspect,
    })?;
    if let Some(style) = args.style {
        engine.run(EditorAction::StyleTransfer { style })?;
    }
    if args.upscale {
        engine.run(EditorAction::Upscale)?;
    }
    let path = engine.download(args.format, args.download_dir.as_deref())?;
    println!("{}", path.display());
    Ok(0)
}

fn list_saved_prompts(config: &EngineConfig) {
    let recall = PromptRecall::load(Box::new(JsonFilePromptStore::new(config.prompts_path())));
    print_prompts(&recall);
}

fn print_prompts(recall: &PromptRecall) {
    if recall.is_empty() {
        println!("No recent prompts.");
        return;
    }
    for (index, prompt) in recall.entries().iter().enumerate() {
        println!("{:>2}. {prompt}", index + 1);
    }
}

fn print_styles() {
    println!(
        "Styles: {}",
        ArtStyle::ALL.map(ArtStyle::name).join(", ")
    );
    println!(
        "Aspect ratios: {}",
        AspectRatio::ALL.map(AspectRatio::label).join(", ")
    );
}

/// Bare text means "generate" on the prompt page and "edit" on the result page.
fn prompt_action(mode: EditorMode, text: String, aspect_ratio: AspectRatio) -> EditorAction {
    match mode {
        EditorMode::Generate => EditorAction::Generate {
            prompt: text,
            aspect_ratio,
        },
        EditorMode::Edit => EditorAction::Edit { instruction: text },
    }
}

/// `/recall` takes the 1-based position shown by `/prompts`.
fn recall_index(raw: Option<&str>, len: usize) -> Result<usize, String> {
    if len == 0 {
        return Err("No recent prompts.".to_string());
    }
    let Some(raw) = raw else {
        return Err(format!("/recall requires a number between 1 and {len}"));
    };
    match raw.parse::<usize>() {
        Ok(position) if (1..=len).contains(&position) => Ok(position - 1),
        _ => Err(format!("/recall requires a number between 1 and {len}")),
    }
}

fn upload_command(intent: &Intent) -> &'static str {
    if intent.action == "upload" {
        "upload"
    } else {
        "face"
    }
}

fn report(engine: &ImaginifyEngine, result: Result<Outcome, SessionError>) {
    match result {
        Ok(Outcome::Committed(artifact)) => {
            println!(
                "Image ready ({}, {}, {} bytes).",
                artifact.id(),
                artifact.mime_type(),
                artifact.len()
            );
            println!("{}", status_line(engine.session()));
        }
        Ok(Outcome::PreviewReady(artifact)) => {
            println!(
                "Face swap preview ready ({}). /accept to keep it, /discard to drop it.",
                artifact.id()
            );
        }
        Ok(Outcome::SourceFaceSet(artifact)) => {
            println!("Source face set ({}).", artifact.id());
        }
        Err(err) => println!("Error: {err}"),
    }
}

fn status_line(session: &EditorSession) -> String {
    let history = session.history();
    let position = match history.current_index() {
        Some(index) => format!("{}/{}", index + 1, history.len()),
        None => "empty".to_string(),
    };
    let mut parts = vec![
        format!("mode {}", session.mode()),
        format!("history {position}"),
    ];
    if history.can_undo() {
        parts.push("undo".to_string());
    }
    if history.can_redo() {
        parts.push("redo".to_string());
    }
    if session.source_face().is_some() {
        parts.push("face set".to_string());
    }
    if session.preview().is_active() {
        parts.push("preview pending".to_string());
    }
    if let Some(error) = session.last_error() {
        parts.push(format!("last error: {error}"));
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use imaginify_contracts::editor::{EditorSession, ImageHistory};
    use imaginify_contracts::prompts::{MemoryPromptStore, PromptRecall};
    use imaginify_contracts::{Artifact, AspectRatio, EditorAction, EditorMode};

    use super::{prompt_action, recall_index, status_line, Cli, Command};

    #[test]
    fn bare_prompt_follows_mode() {
        assert_eq!(
            prompt_action(
                EditorMode::Generate,
                "a fox".to_string(),
                AspectRatio::Portrait
            ),
            EditorAction::Generate {
                prompt: "a fox".to_string(),
                aspect_ratio: AspectRatio::Portrait,
            }
        );
        assert_eq!(
            prompt_action(EditorMode::Edit, "add snow".to_string(), AspectRatio::Square),
            EditorAction::Edit {
                instruction: "add snow".to_string(),
            }
        );
    }

    #[test]
    fn recall_index_is_one_based() {
        assert_eq!(recall_index(Some("1"), 3), Ok(0));
        assert_eq!(recall_index(Some("3"), 3), Ok(2));
        assert!(recall_index(Some("4"), 3).is_err());
        assert!(recall_index(Some("zero"), 3).is_err());
        assert!(recall_index(None, 3).is_err());
        assert_eq!(recall_index(Some("1"), 0), Err("No recent prompts.".to_string()));
    }

    #[test]
    fn status_line_summarises_session() {
        let recall = PromptRecall::load(Box::new(MemoryPromptStore::new()));
        let session = EditorSession::new(recall);
        assert_eq!(status_line(&session), "mode generate | history empty");

        let recall = PromptRecall::load(Box::new(MemoryPromptStore::new()));
        let history = ImageHistory::with_entries(vec![
            Artifact::new(vec![1u8], "image/png"),
            Artifact::new(vec![2u8], "image/png"),
        ]);
        let session = EditorSession::with_history(recall, history);
        assert!(status_line(&session).contains("history 2/2 | undo"));
    }

    #[test]
    fn run_subcommand_parses_typed_flags() {
        let cli = Cli::try_parse_from([
            "imaginify",
            "--dryrun",
            "run",
            "--prompt",
            "a fox",
            "--aspect",
            "16:9",
            "--style",
            "pop art",
            "--format",
            "jpeg",
        ]);
        let Ok(cli) = cli else {
            panic!("cli should parse");
        };
        assert!(cli.dryrun);
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.aspect, AspectRatio::Landscape);
        assert_eq!(args.style.map(|style| style.name()), Some("Pop Art"));
        assert!(!args.upscale);

        assert!(Cli::try_parse_from(["imaginify", "run", "--prompt", "x", "--aspect", "2:3"]).is_err());
    }
}
