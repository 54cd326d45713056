use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    ArgCommandSpec, CommandSpec, DOWNLOAD_COMMAND, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn find_arg_command(command: &str) -> Option<&'static ArgCommandSpec> {
    RAW_ARG_COMMANDS.iter().find(|spec| spec.command == command)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Turns one line of REPL input into an [`Intent`].
///
/// Slash commands map through the command registry; anything else is a
/// bare prompt whose meaning depends on the editor mode.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let remainder = &slash_tail[command_len..];
            let arg = if remainder.is_empty() {
                ""
            } else {
                remainder.trim()
            };

            if let Some(spec) = find_arg_command(&command) {
                let mut intent = Intent::new(spec.action, text);
                intent
                    .command_args
                    .insert(spec.key.to_string(), Value::String(arg.to_string()));
                if spec.key == "prompt" && !arg.is_empty() {
                    intent.prompt = Some(arg.to_string());
                }
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == DOWNLOAD_COMMAND.command {
                let mut intent = Intent::new(DOWNLOAD_COMMAND.action, text);
                intent.command_args.insert(
                    "format".to_string(),
                    Value::String(if arg.is_empty() {
                        "png".to_string()
                    } else {
                        arg.to_ascii_lowercase()
                    }),
                );
                return intent;
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("prompt", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn bare_text_is_a_prompt() {
        let intent = parse_intent("  a neon city at night ");
        assert_eq!(intent.action, "prompt");
        assert_eq!(intent.prompt.as_deref(), Some("a neon city at night"));
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn parse_generate_and_edit_prompts() {
        let generate = parse_intent("/generate a castle in the clouds");
        assert_eq!(generate.action, "generate");
        assert_eq!(generate.prompt.as_deref(), Some("a castle in the clouds"));
        assert_eq!(
            generate.command_args["prompt"],
            json!("a castle in the clouds")
        );

        let edit = parse_intent("/EDIT add a moon");
        assert_eq!(edit.action, "edit");
        assert_eq!(edit.prompt.as_deref(), Some("add a moon"));

        let empty = parse_intent("/generate");
        assert_eq!(empty.action, "generate");
        assert!(empty.prompt.is_none());
        assert!(empty.arg_str("prompt").is_none());
    }

    #[test]
    fn parse_upload_quoted_paths() {
        let upload = parse_intent("/upload \"/tmp/my photo.png\"");
        assert_eq!(upload.action, "upload");
        assert_eq!(upload.command_args["path"], json!("/tmp/my photo.png"));

        let face = parse_intent("/face face.jpg");
        assert_eq!(face.action, "upload_face");
        assert_eq!(face.arg_str("path"), Some("face.jpg"));
    }

    #[test]
    fn parse_style_aspect_mode_and_recall() {
        let style = parse_intent("/style pop art");
        assert_eq!(style.action, "style_transfer");
        assert_eq!(style.arg_str("style"), Some("pop art"));

        let aspect = parse_intent("/aspect 16:9");
        assert_eq!(aspect.action, "set_aspect_ratio");
        assert_eq!(aspect.arg_str("aspect_ratio"), Some("16:9"));

        let mode = parse_intent("/mode edit");
        assert_eq!(mode.action, "set_mode");
        assert_eq!(mode.arg_str("mode"), Some("edit"));

        let recall = parse_intent("/recall 3");
        assert_eq!(recall.action, "recall");
        assert_eq!(recall.arg_str("index"), Some("3"));
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_intent("/upscale").action, "upscale");
        assert_eq!(parse_intent("/faceswap").action, "replace_face");
        assert_eq!(parse_intent("/accept").action, "accept_preview");
        assert_eq!(parse_intent("/discard").action, "discard_preview");
        assert_eq!(parse_intent("/undo").action, "undo");
        assert_eq!(parse_intent("/redo").action, "redo");
        assert_eq!(parse_intent("/clear_face").action, "clear_face");
        assert_eq!(parse_intent("/back").action, "go_to_prompt");
        assert_eq!(parse_intent("/prompts").action, "list_prompts");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn parse_download_defaults_to_png() {
        let download = parse_intent("/download");
        assert_eq!(download.action, "download");
        assert_eq!(download.command_args["format"], json!("png"));

        let jpeg = parse_intent("/download JPEG");
        assert_eq!(jpeg.command_args["format"], json!("jpeg"));
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
