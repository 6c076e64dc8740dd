//! Static command registry.
//!
//! Maps each type tag to a [`CommandDescriptor`]: default settings, settings
//! migration, construction from a settings payload, validation, and the
//! block slots the command owns. Populated from an explicit list in
//! [`CommandRegistry::builtin`].

use crate::graph::{CURRENT_VERSION, CommandKind, CommandNode, MacroScript};
use crate::node_types::{BLOCK_BODY, BLOCK_ELSE, BLOCK_THEN, CommandType};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSlot {
    pub name: &'static str,
    pub min_children: usize,
    pub max_children: Option<usize>,
    pub allow_empty: bool,
}

impl BlockSlot {
    pub const fn open(name: &'static str) -> Self {
        Self {
            name,
            min_children: 0,
            max_children: None,
            allow_empty: true,
        }
    }
}

const CONDITIONAL_SLOTS: &[BlockSlot] = &[BlockSlot::open(BLOCK_THEN), BlockSlot::open(BLOCK_ELSE)];
const LOOP_SLOTS: &[BlockSlot] = &[BlockSlot::open(BLOCK_BODY)];

pub type BuildFn = fn(Json) -> serde_json::Result<CommandKind>;

#[derive(Clone, Copy)]
pub struct CommandDescriptor {
    pub command_type: CommandType,
    pub block_slots: &'static [BlockSlot],
    build: BuildFn,
}

impl CommandDescriptor {
    pub fn new(command_type: CommandType, block_slots: &'static [BlockSlot], build: BuildFn) -> Self {
        Self {
            command_type,
            block_slots,
            build,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.command_type.tag()
    }

    pub fn default_settings(&self) -> Json {
        CommandKind::default_for(self.command_type).settings_json()
    }

    /// Brings a settings payload written by `from_version` up to the current layout.
    pub fn migrate(&self, settings: Json, from_version: u32) -> Json {
        if from_version >= CURRENT_VERSION {
            return settings;
        }
        match settings {
            Json::Object(map) => {
                let mut map = migrate_v1(map);
                if self.command_type == CommandType::IfVariable {
                    stringify_scalar(&mut map, "value");
                }
                Json::Object(map)
            }
            other => other,
        }
    }

    pub fn build(&self, settings: Json) -> serde_json::Result<CommandKind> {
        (self.build)(settings)
    }

    pub fn validate(&self, kind: &CommandKind) -> Vec<String> {
        kind.validate()
    }

    /// New node with default settings.
    pub fn create(&self) -> CommandNode {
        CommandNode::new(CommandKind::default_for(self.command_type))
    }

    pub fn slot(&self, name: &str) -> Option<&BlockSlot> {
        self.block_slots.iter().find(|s| s.name == name)
    }
}

/// Version 1 scripts used PascalCase keys and flat image fields.
fn migrate_v1(map: Map<String, Json>) -> Map<String, Json> {
    let mut out = Map::new();
    let mut image = Map::new();
    for (key, value) in map {
        match key.as_str() {
            "Wait" => {
                out.insert("durationMs".into(), value);
            }
            "Timeout" => {
                out.insert("timeoutMs".into(), value);
            }
            "Interval" => {
                out.insert("pollIntervalMs".into(), value);
            }
            "ImagePath" => {
                image.insert("path".into(), value);
            }
            "Threshold" => {
                image.insert("threshold".into(), value);
            }
            _ => {
                out.insert(lower_first(&key), value);
            }
        }
    }
    if !image.is_empty() {
        out.insert("image".into(), Json::Object(image));
    }
    out
}

/// Version 1 stored compare values as raw JSON scalars.
fn stringify_scalar(map: &mut Map<String, Json>, key: &str) {
    let text = match map.get(key) {
        Some(Json::Number(n)) => n.to_string(),
        Some(Json::Bool(b)) => b.to_string(),
        _ => return,
    };
    map.insert(key.into(), Json::String(text));
}

fn lower_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone)]
pub struct CommandRegistry {
    descriptors: BTreeMap<&'static str, CommandDescriptor>,
}

impl CommandRegistry {
    pub fn empty() -> Self {
        Self {
            descriptors: BTreeMap::new(),
        }
    }

    /// Every built-in command type.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        let builtins = [
            CommandDescriptor::new(CommandType::Wait, &[], |v| {
                Ok(CommandKind::Wait(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::Click, &[], |v| {
                Ok(CommandKind::Click(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::ClickImage, &[], |v| {
                Ok(CommandKind::ClickImage(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::KeyInput, &[], |v| {
                Ok(CommandKind::KeyInput(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::SetVariable, &[], |v| {
                Ok(CommandKind::SetVariable(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::If, CONDITIONAL_SLOTS, |v| {
                Ok(CommandKind::If(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::IfVariable, CONDITIONAL_SLOTS, |v| {
                Ok(CommandKind::IfVariable(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::IfImageExist, CONDITIONAL_SLOTS, |v| {
                Ok(CommandKind::IfImageExist(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::Loop, LOOP_SLOTS, |v| {
                Ok(CommandKind::Loop(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::Break, &[], |_| Ok(CommandKind::Break)),
            CommandDescriptor::new(CommandType::Continue, &[], |_| Ok(CommandKind::Continue)),
            CommandDescriptor::new(CommandType::WaitImageExist, &[], |v| {
                Ok(CommandKind::WaitImageExist(serde_json::from_value(v)?))
            }),
            CommandDescriptor::new(CommandType::WaitImageNotExist, &[], |v| {
                Ok(CommandKind::WaitImageNotExist(serde_json::from_value(v)?))
            }),
        ];
        for descriptor in builtins {
            registry.register(descriptor);
        }
        registry
    }

    /// Adds or replaces the descriptor for its tag.
    pub fn register(&mut self, descriptor: CommandDescriptor) {
        self.descriptors.insert(descriptor.tag(), descriptor);
    }

    pub fn get(&self, tag: &str) -> Option<&CommandDescriptor> {
        self.descriptors.get(tag)
    }

    pub fn descriptor_for(&self, ty: CommandType) -> Option<&CommandDescriptor> {
        self.get(ty.tag())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.descriptors.values()
    }

    pub fn create_default(&self, tag: &str) -> Option<CommandNode> {
        self.get(tag).map(CommandDescriptor::create)
    }

    /// Settings and block-slot problems for `node` and its descendants.
    pub fn validate_node(&self, node: &CommandNode, path: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(descriptor) = self.descriptor_for(node.command_type()) else {
            errors.push(format!("{}: unregistered command type", path));
            return errors;
        };

        for message in descriptor.validate(&node.kind) {
            errors.push(format!("{}: {}", path, message));
        }

        for block in &node.blocks {
            if descriptor.slot(&block.name).is_none() {
                errors.push(format!("{}: unexpected block '{}'", path, block.name));
            }
        }
        for slot in descriptor.block_slots {
            let count = node.block(slot.name).map(|b| b.nodes.len()).unwrap_or(0);
            if count == 0 && !slot.allow_empty {
                errors.push(format!("{}: block '{}' must not be empty", path, slot.name));
            } else if count < slot.min_children {
                errors.push(format!(
                    "{}: block '{}' needs at least {} commands (has {})",
                    path, slot.name, slot.min_children, count
                ));
            }
            if let Some(max) = slot.max_children {
                if count > max {
                    errors.push(format!(
                        "{}: block '{}' allows at most {} commands (has {})",
                        path, slot.name, max, count
                    ));
                }
            }
        }

        for block in &node.blocks {
            for (index, child) in block.nodes.iter().enumerate() {
                let child_path = format!(
                    "{}/{}[{}] {}",
                    path,
                    block.name,
                    index,
                    child.command_type()
                );
                errors.extend(self.validate_node(child, &child_path));
            }
        }
        errors
    }

    pub fn validate_script(&self, script: &MacroScript) -> Vec<String> {
        script
            .commands
            .iter()
            .enumerate()
            .flat_map(|(index, node)| {
                self.validate_node(node, &format!("[{}] {}", index, node.command_type()))
            })
            .collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
