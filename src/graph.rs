use super::node_types::CommandType;
use crate::settings::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CURRENT_VERSION: u32 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct MacroScript {
    pub name: String,
    pub version: u32,
    /// Body of the implicit root loop.
    pub commands: Vec<CommandNode>,
}

impl Default for MacroScript {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            version: CURRENT_VERSION,
            commands: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandNode {
    pub id: Uuid,
    pub enabled: bool,
    pub kind: CommandKind,
    pub blocks: Vec<CommandBlock>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandBlock {
    pub name: String,
    pub nodes: Vec<CommandNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommandKind {
    Wait(WaitSettings),
    Click(ClickSettings),
    ClickImage(ClickImageSettings),
    KeyInput(KeyInputSettings),
    SetVariable(SetVariableSettings),
    If(IfSettings),
    IfVariable(IfVariableSettings),
    IfImageExist(IfImageExistSettings),
    Loop(LoopSettings),
    Break,
    Continue,
    WaitImageExist(WaitImageSettings),
    WaitImageNotExist(WaitImageSettings),
}

/// Loosely typed scalar held in the variable scope.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::String(String::new())
    }
}

impl CommandKind {
    pub fn command_type(&self) -> CommandType {
        match self {
            CommandKind::Wait(_) => CommandType::Wait,
            CommandKind::Click(_) => CommandType::Click,
            CommandKind::ClickImage(_) => CommandType::ClickImage,
            CommandKind::KeyInput(_) => CommandType::KeyInput,
            CommandKind::SetVariable(_) => CommandType::SetVariable,
            CommandKind::If(_) => CommandType::If,
            CommandKind::IfVariable(_) => CommandType::IfVariable,
            CommandKind::IfImageExist(_) => CommandType::IfImageExist,
            CommandKind::Loop(_) => CommandType::Loop,
            CommandKind::Break => CommandType::Break,
            CommandKind::Continue => CommandType::Continue,
            CommandKind::WaitImageExist(_) => CommandType::WaitImageExist,
            CommandKind::WaitImageNotExist(_) => CommandType::WaitImageNotExist,
        }
    }

    /// Default settings for a command type.
    pub fn default_for(ty: CommandType) -> Self {
        match ty {
            CommandType::Wait => CommandKind::Wait(WaitSettings::default()),
            CommandType::Click => CommandKind::Click(ClickSettings::default()),
            CommandType::ClickImage => CommandKind::ClickImage(ClickImageSettings::default()),
            CommandType::KeyInput => CommandKind::KeyInput(KeyInputSettings::default()),
            CommandType::SetVariable => CommandKind::SetVariable(SetVariableSettings::default()),
            CommandType::If => CommandKind::If(IfSettings::default()),
            CommandType::IfVariable => CommandKind::IfVariable(IfVariableSettings::default()),
            CommandType::IfImageExist => {
                CommandKind::IfImageExist(IfImageExistSettings::default())
            }
            CommandType::Loop => CommandKind::Loop(LoopSettings::default()),
            CommandType::Break => CommandKind::Break,
            CommandType::Continue => CommandKind::Continue,
            CommandType::WaitImageExist => CommandKind::WaitImageExist(WaitImageSettings::default()),
            CommandType::WaitImageNotExist => {
                CommandKind::WaitImageNotExist(WaitImageSettings::default())
            }
        }
    }

    pub fn validate(&self) -> Vec<String> {
        match self {
            CommandKind::Wait(s) => s.validate(),
            CommandKind::Click(s) => s.validate(),
            CommandKind::ClickImage(s) => s.validate(),
            CommandKind::KeyInput(s) => s.validate(),
            CommandKind::SetVariable(s) => s.validate(),
            CommandKind::If(s) => s.validate(),
            CommandKind::IfVariable(s) => s.validate(),
            CommandKind::IfImageExist(s) => s.validate(),
            CommandKind::Loop(s) => s.validate(),
            CommandKind::Break | CommandKind::Continue => Vec::new(),
            CommandKind::WaitImageExist(s) | CommandKind::WaitImageNotExist(s) => s.validate(),
        }
    }

    /// Settings payload as JSON. Break and Continue have none and serialize to `{}`.
    pub fn settings_json(&self) -> serde_json::Value {
        let value = match self {
            CommandKind::Wait(s) => serde_json::to_value(s),
            CommandKind::Click(s) => serde_json::to_value(s),
            CommandKind::ClickImage(s) => serde_json::to_value(s),
            CommandKind::KeyInput(s) => serde_json::to_value(s),
            CommandKind::SetVariable(s) => serde_json::to_value(s),
            CommandKind::If(s) => serde_json::to_value(s),
            CommandKind::IfVariable(s) => serde_json::to_value(s),
            CommandKind::IfImageExist(s) => serde_json::to_value(s),
            CommandKind::Loop(s) => serde_json::to_value(s),
            CommandKind::Break | CommandKind::Continue => Ok(serde_json::json!({})),
            CommandKind::WaitImageExist(s) | CommandKind::WaitImageNotExist(s) => {
                serde_json::to_value(s)
            }
        };
        // Plain data records with string keys always serialize.
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Short human-readable summary used in listings and logs.
    pub fn summary(&self) -> String {
        match self {
            CommandKind::Wait(s) => format!("{} ms", s.duration_ms),
            CommandKind::Click(s) => format!("{:?} x{} at ({}, {})", s.button, s.click_count, s.x, s.y),
            CommandKind::ClickImage(s) => format!("{:?} on {}", s.button, s.image.path),
            CommandKind::KeyInput(s) => s.keys.clone(),
            CommandKind::SetVariable(s) => format!("{} = {}", s.name, s.value.as_text()),
            CommandKind::If(s) => s.condition.clone(),
            CommandKind::IfVariable(s) => format!("{} {:?} {}", s.name, s.operator, s.value),
            CommandKind::IfImageExist(s) => s.image.path.clone(),
            CommandKind::Loop(s) => format!("{} times", s.loop_count),
            CommandKind::Break | CommandKind::Continue => String::new(),
            CommandKind::WaitImageExist(s) | CommandKind::WaitImageNotExist(s) => {
                format!("{} (timeout {} ms)", s.image.path, s.timeout_ms)
            }
        }
    }
}

impl CommandNode {
    /// Creates an enabled node with a fresh id and the blocks its type declares.
    pub fn new(kind: CommandKind) -> Self {
        Self::with_id(Uuid::new_v4(), kind)
    }

    pub fn with_id(id: Uuid, kind: CommandKind) -> Self {
        let blocks = kind
            .command_type()
            .block_names()
            .iter()
            .map(|name| CommandBlock::new(name))
            .collect();
        Self {
            id,
            enabled: true,
            kind,
            blocks,
        }
    }

    pub fn command_type(&self) -> CommandType {
        self.kind.command_type()
    }

    pub fn is_composite(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn block(&self, name: &str) -> Option<&CommandBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut CommandBlock> {
        self.blocks.iter_mut().find(|b| b.name == name)
    }

    /// Nodes of a named block, empty if the block does not exist.
    pub fn children(&self, name: &str) -> &[CommandNode] {
        self.block(name).map(|b| b.nodes.as_slice()).unwrap_or(&[])
    }

    /// Builder helper: appends `node` to block `name`.
    pub fn push_child(mut self, name: &str, node: CommandNode) -> Self {
        if let Some(block) = self.block_mut(name) {
            block.nodes.push(node);
        }
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Compares everything except ids.
    pub fn structurally_eq(&self, other: &CommandNode) -> bool {
        self.enabled == other.enabled
            && self.kind == other.kind
            && self.blocks.len() == other.blocks.len()
            && self.blocks.iter().zip(&other.blocks).all(|(a, b)| {
                a.name == b.name
                    && a.nodes.len() == b.nodes.len()
                    && a.nodes.iter().zip(&b.nodes).all(|(x, y)| x.structurally_eq(y))
            })
    }

    fn count(&self) -> usize {
        1 + self
            .blocks
            .iter()
            .flat_map(|b| &b.nodes)
            .map(CommandNode::count)
            .sum::<usize>()
    }
}

impl CommandBlock {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
        }
    }
}

impl MacroScript {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn node_count(&self) -> usize {
        self.commands.iter().map(CommandNode::count).sum()
    }

    pub fn find(&self, id: Uuid) -> Option<&CommandNode> {
        find_in(&self.commands, id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut CommandNode> {
        find_in_mut(&mut self.commands, id)
    }

    pub fn structurally_eq(&self, other: &MacroScript) -> bool {
        self.commands.len() == other.commands.len()
            && self
                .commands
                .iter()
                .zip(&other.commands)
                .all(|(a, b)| a.structurally_eq(b))
    }
}

fn find_in(nodes: &[CommandNode], id: Uuid) -> Option<&CommandNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        for block in &node.blocks {
            if let Some(found) = find_in(&block.nodes, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_in_mut(nodes: &mut [CommandNode], id: Uuid) -> Option<&mut CommandNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        for block in &mut node.blocks {
            if let Some(found) = find_in_mut(&mut block.nodes, id) {
                return Some(found);
            }
        }
    }
    None
}
