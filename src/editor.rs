//! Tree editing with undo.
//!
//! Every operation works on a copy of the script and only commits it when the
//! whole edit succeeds, so a failed edit leaves the script and the undo stack
//! untouched. Each committed edit pushes one snapshot.

use crate::error::EditError;
use crate::graph::{CommandKind, CommandNode, MacroScript};
use crate::history::UndoStack;
use std::collections::HashSet;
use uuid::Uuid;

/// Insertion point: `None` is the script root, otherwise a block of a
/// composite node.
pub type Parent<'a> = Option<(Uuid, &'a str)>;

pub struct MacroEditor {
    script: MacroScript,
    undo_stack: UndoStack,
}

impl MacroEditor {
    pub fn new(script: MacroScript) -> Self {
        Self::with_history(script, UndoStack::new())
    }

    pub fn with_history(script: MacroScript, mut undo_stack: UndoStack) -> Self {
        undo_stack.push(&script);
        Self { script, undo_stack }
    }

    pub fn script(&self) -> &MacroScript {
        &self.script
    }

    pub fn into_script(self) -> MacroScript {
        self.script
    }

    /// Inserts `node` at `index` of the chosen container and returns its id.
    ///
    /// Fails if `node` or one of its descendants reuses an id.
    pub fn insert(
        &mut self,
        parent: Parent<'_>,
        index: usize,
        node: CommandNode,
    ) -> Result<Uuid, EditError> {
        let id = node.id;
        let mut seen = HashSet::new();
        check_new_ids(&self.script, &node, &mut seen)?;
        let mut next = self.script.clone();
        insert_into(&mut next, parent, index, node)?;
        self.commit(next);
        Ok(id)
    }

    pub fn remove(&mut self, id: Uuid) -> Result<CommandNode, EditError> {
        let mut next = self.script.clone();
        let removed = remove_from(&mut next.commands, id).ok_or(EditError::NodeNotFound(id))?;
        self.commit(next);
        Ok(removed)
    }

    /// Swaps the settings of `id` for `kind`. The command type cannot change.
    pub fn replace_settings(&mut self, id: Uuid, kind: CommandKind) -> Result<(), EditError> {
        let mut next = self.script.clone();
        let node = next.find_mut(id).ok_or(EditError::NodeNotFound(id))?;
        let expected = node.command_type();
        if kind.command_type() != expected {
            return Err(EditError::TypeMismatch {
                expected: expected.tag().to_string(),
                found: kind.command_type().tag().to_string(),
            });
        }
        node.kind = kind;
        self.commit(next);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) -> Result<(), EditError> {
        let mut next = self.script.clone();
        next.find_mut(id).ok_or(EditError::NodeNotFound(id))?.enabled = enabled;
        self.commit(next);
        Ok(())
    }

    /// Moves `id` to `index` of the target container. `index` counts
    /// positions after the node has been taken out.
    pub fn move_node(&mut self, id: Uuid, parent: Parent<'_>, index: usize) -> Result<(), EditError> {
        if let Some((parent_id, _)) = parent {
            let node = self.script.find(id).ok_or(EditError::NodeNotFound(id))?;
            if parent_id == id || contains_descendant(node, parent_id) {
                return Err(EditError::IntoOwnDescendant);
            }
        }

        let mut next = self.script.clone();
        let node = remove_from(&mut next.commands, id).ok_or(EditError::NodeNotFound(id))?;
        insert_into(&mut next, parent, index, node)?;
        self.commit(next);
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        match self.undo_stack.undo() {
            Some(script) => {
                self.script = script;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.undo_stack.redo() {
            Some(script) => {
                self.script = script;
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, script: MacroScript) {
        self.undo_stack.push(&script);
        self.script = script;
    }
}

fn insert_into(
    script: &mut MacroScript,
    parent: Parent<'_>,
    index: usize,
    node: CommandNode,
) -> Result<(), EditError> {
    let nodes = match parent {
        None => &mut script.commands,
        Some((parent_id, block)) => {
            let owner = script
                .find_mut(parent_id)
                .ok_or(EditError::NodeNotFound(parent_id))?;
            &mut owner
                .block_mut(block)
                .ok_or_else(|| EditError::BlockNotFound {
                    id: parent_id,
                    block: block.to_string(),
                })?
                .nodes
        }
    };
    if index > nodes.len() {
        return Err(EditError::IndexOutOfRange {
            index,
            len: nodes.len(),
        });
    }
    nodes.insert(index, node);
    Ok(())
}

fn remove_from(nodes: &mut Vec<CommandNode>, id: Uuid) -> Option<CommandNode> {
    if let Some(pos) = nodes.iter().position(|n| n.id == id) {
        return Some(nodes.remove(pos));
    }
    nodes
        .iter_mut()
        .flat_map(|n| n.blocks.iter_mut())
        .find_map(|block| remove_from(&mut block.nodes, id))
}

fn check_new_ids(
    script: &MacroScript,
    node: &CommandNode,
    seen: &mut HashSet<Uuid>,
) -> Result<(), EditError> {
    if !seen.insert(node.id) || script.find(node.id).is_some() {
        return Err(EditError::DuplicateId(node.id));
    }
    node.blocks
        .iter()
        .flat_map(|b| &b.nodes)
        .try_for_each(|child| check_new_ids(script, child, seen))
}

fn contains_descendant(node: &CommandNode, id: Uuid) -> bool {
    node.blocks
        .iter()
        .flat_map(|b| &b.nodes)
        .any(|child| child.id == id || contains_descendant(child, id))
}
