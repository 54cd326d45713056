#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ArgCommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub key: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[ArgCommandSpec] = &[
    ArgCommandSpec {
        command: "generate",
        action: "generate",
        key: "prompt",
    },
    ArgCommandSpec {
        command: "edit",
        action: "edit",
        key: "prompt",
    },
    ArgCommandSpec {
        command: "style",
        action: "style_transfer",
        key: "style",
    },
    ArgCommandSpec {
        command: "aspect",
        action: "set_aspect_ratio",
        key: "aspect_ratio",
    },
    ArgCommandSpec {
        command: "mode",
        action: "set_mode",
        key: "mode",
    },
    ArgCommandSpec {
        command: "recall",
        action: "recall",
        key: "index",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload",
    },
    CommandSpec {
        command: "face",
        action: "upload_face",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upscale",
        action: "upscale",
    },
    CommandSpec {
        command: "faceswap",
        action: "replace_face",
    },
    CommandSpec {
        command: "accept",
        action: "accept_preview",
    },
    CommandSpec {
        command: "discard",
        action: "discard_preview",
    },
    CommandSpec {
        command: "undo",
        action: "undo",
    },
    CommandSpec {
        command: "redo",
        action: "redo",
    },
    CommandSpec {
        command: "clear_face",
        action: "clear_face",
    },
    CommandSpec {
        command: "back",
        action: "go_to_prompt",
    },
    CommandSpec {
        command: "prompts",
        action: "list_prompts",
    },
    CommandSpec {
        command: "styles",
        action: "list_styles",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const DOWNLOAD_COMMAND: CommandSpec = CommandSpec {
    command: "download",
    action: "download",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/generate",
    "/edit",
    "/upscale",
    "/style",
    "/styles",
    "/faceswap",
    "/accept",
    "/discard",
    "/upload",
    "/face",
    "/clear_face",
    "/back",
    "/undo",
    "/redo",
    "/aspect",
    "/mode",
    "/download",
    "/prompts",
    "/recall",
    "/status",
    "/help",
    "/quit",
];
