use serde::{Deserialize, Serialize};

pub const BLOCK_THEN: &str = "Then";
pub const BLOCK_ELSE: &str = "Else";
pub const BLOCK_BODY: &str = "Body";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CommandType {
    Wait,
    Click,
    ClickImage,
    KeyInput,
    SetVariable,
    // Conditionals
    If,
    IfVariable,
    IfImageExist,
    // Loops
    Loop,
    Break,
    Continue,
    // Image waits
    WaitImageExist,
    WaitImageNotExist,
}

impl CommandType {
    pub const ALL: [CommandType; 13] = [
        CommandType::Wait,
        CommandType::Click,
        CommandType::ClickImage,
        CommandType::KeyInput,
        CommandType::SetVariable,
        CommandType::If,
        CommandType::IfVariable,
        CommandType::IfImageExist,
        CommandType::Loop,
        CommandType::Break,
        CommandType::Continue,
        CommandType::WaitImageExist,
        CommandType::WaitImageNotExist,
    ];

    /// Stable tag used in saved scripts.
    pub fn tag(self) -> &'static str {
        match self {
            CommandType::Wait => "Wait",
            CommandType::Click => "Click",
            CommandType::ClickImage => "ClickImage",
            CommandType::KeyInput => "KeyInput",
            CommandType::SetVariable => "SetVariable",
            CommandType::If => "If",
            CommandType::IfVariable => "IfVariable",
            CommandType::IfImageExist => "IfImageExist",
            CommandType::Loop => "Loop",
            CommandType::Break => "Break",
            CommandType::Continue => "Continue",
            CommandType::WaitImageExist => "WaitImageExist",
            CommandType::WaitImageNotExist => "WaitImageNotExist",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CommandType::Wait => "Wait",
            CommandType::Click => "Click",
            CommandType::ClickImage => "Click Image",
            CommandType::KeyInput => "Hotkey",
            CommandType::SetVariable => "Set Variable",
            CommandType::If => "If",
            CommandType::IfVariable => "If Variable",
            CommandType::IfImageExist => "If Image Exist",
            CommandType::Loop => "Loop",
            CommandType::Break => "Break",
            CommandType::Continue => "Continue",
            CommandType::WaitImageExist => "Wait Image Exist",
            CommandType::WaitImageNotExist => "Wait Image Not Exist",
        }
    }

    /// Named child blocks owned by nodes of this type, in display order.
    pub fn block_names(self) -> &'static [&'static str] {
        match self {
            CommandType::If | CommandType::IfVariable | CommandType::IfImageExist => {
                &[BLOCK_THEN, BLOCK_ELSE]
            }
            CommandType::Loop => &[BLOCK_BODY],
            _ => &[],
        }
    }

    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            CommandType::If | CommandType::IfVariable | CommandType::IfImageExist
        )
    }

    pub fn is_loop(self) -> bool {
        self == CommandType::Loop
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
