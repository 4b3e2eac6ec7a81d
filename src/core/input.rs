/* ------------------------ Virtual actions ------------------------ */

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VirtualAction {
    count_up,
    count_down,
    start,
    accept,
    decline,
    exit,
}

impl VirtualAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::count_up => "+",
            Self::count_down => "-",
            Self::start => "spin",
            Self::accept => "accept",
            Self::decline => "decline",
            Self::exit => "quit",
        }
    }
}

/* ------------------------- Normalized input events ------------------------- */

#[derive(Clone, Copy, Debug)]
pub struct InputEvent {
    pub action: VirtualAction,
    pub pressed: bool,
}

impl InputEvent {
    #[inline(always)]
    pub const fn press(action: VirtualAction) -> Self {
        Self {
            action,
            pressed: true,
        }
    }
}

// Every word the console accepts, lower case.
static COMMAND_MAP: [(&str, VirtualAction); 17] = [
    ("+", VirtualAction::count_up),
    ("up", VirtualAction::count_up),
    ("more", VirtualAction::count_up),
    ("-", VirtualAction::count_down),
    ("down", VirtualAction::count_down),
    ("less", VirtualAction::count_down),
    ("spin", VirtualAction::start),
    ("start", VirtualAction::start),
    ("", VirtualAction::start),
    ("accept", VirtualAction::accept),
    ("yes", VirtualAction::accept),
    ("y", VirtualAction::accept),
    ("decline", VirtualAction::decline),
    ("no", VirtualAction::decline),
    ("n", VirtualAction::decline),
    ("quit", VirtualAction::exit),
    ("q", VirtualAction::exit),
];

/// Maps one console line onto a press. An empty line means "spin".
pub fn map_console_line(line: &str) -> Option<InputEvent> {
    let word = line.trim().to_ascii_lowercase();
    COMMAND_MAP
        .iter()
        .find(|(cmd, _)| *cmd == word)
        .map(|&(_, action)| InputEvent::press(action))
}

/// Short usage line listing the primary command for each action.
pub fn console_help() -> String {
    [
        VirtualAction::count_up,
        VirtualAction::count_down,
        VirtualAction::start,
        VirtualAction::accept,
        VirtualAction::decline,
        VirtualAction::exit,
    ]
    .iter()
    .map(|a| a.as_str())
    .collect::<Vec<_>>()
    .join(" | ")
}
