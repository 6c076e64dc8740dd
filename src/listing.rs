//! Flat listing view of a command tree.
//!
//! The desktop editor shows scripts as a flat list where composites are
//! bracketed by marker lines (`Else`, `EndIf`, `EndLoop`). Nesting levels
//! and start/end pairs are recomputed from the list order alone.
//!
//! Pairing is greedy: each start takes the nearest later unmatched end of
//! its family at the same level. Interleaved markers in a hand-edited list
//! can therefore pair differently than the author intended.

use crate::error::ListingError;
use crate::graph::{CommandNode, MacroScript};
use crate::node_types::{BLOCK_BODY, BLOCK_ELSE, BLOCK_THEN, CommandType};
use std::fmt::Write;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingKind {
    Command(CommandType),
    Else,
    EndIf,
    EndLoop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    If,
    Loop,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Start(Family),
    Middle,
    End(Family),
    Plain,
}

impl ListingKind {
    fn role(self) -> Role {
        match self {
            ListingKind::Command(ty) if ty.is_conditional() => Role::Start(Family::If),
            ListingKind::Command(ty) if ty.is_loop() => Role::Start(Family::Loop),
            ListingKind::Command(_) => Role::Plain,
            ListingKind::Else => Role::Middle,
            ListingKind::EndIf => Role::End(Family::If),
            ListingKind::EndLoop => Role::End(Family::Loop),
        }
    }

    pub fn is_marker(self) -> bool {
        !matches!(self.role(), Role::Plain)
    }

    pub fn label(self) -> &'static str {
        match self {
            ListingKind::Command(ty) => ty.tag(),
            ListingKind::Else => "Else",
            ListingKind::EndIf => "EndIf",
            ListingKind::EndLoop => "EndLoop",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListingItem {
    /// 1-based position in the listing.
    pub line: usize,
    pub kind: ListingKind,
    /// Command the line belongs to. End markers point at their composite.
    pub node_id: Option<Uuid>,
    pub enabled: bool,
    pub nest_level: usize,
    pub pair_line: Option<usize>,
}

impl ListingItem {
    pub fn new(line: usize, kind: ListingKind) -> Self {
        Self {
            line,
            kind,
            node_id: None,
            enabled: true,
            nest_level: 0,
            pair_line: None,
        }
    }
}

/// Builds items numbered from 1 for a bare sequence of kinds.
pub fn items_from_kinds(kinds: &[ListingKind]) -> Vec<ListingItem> {
    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| ListingItem::new(i + 1, *kind))
        .collect()
}

/// Assigns nesting levels in list order.
///
/// End markers decrement before they are assigned, start markers increment
/// after. `Else` sits on the level of its `If`.
pub fn compute_nesting(items: &mut [ListingItem]) -> Result<(), ListingError> {
    let mut level = 0usize;
    for item in items.iter_mut() {
        match item.kind.role() {
            Role::Start(_) => {
                item.nest_level = level;
                level += 1;
            }
            Role::Middle => {
                item.nest_level = level
                    .checked_sub(1)
                    .ok_or(ListingError::UnbalancedEnd { line: item.line })?;
            }
            Role::End(_) => {
                level = level
                    .checked_sub(1)
                    .ok_or(ListingError::UnbalancedEnd { line: item.line })?;
                item.nest_level = level;
            }
            Role::Plain => item.nest_level = level,
        }
    }
    Ok(())
}

/// Pairs start and end markers. Expects levels from [`compute_nesting`].
pub fn pair_markers(items: &mut [ListingItem]) {
    for item in items.iter_mut() {
        item.pair_line = None;
    }

    for start in 0..items.len() {
        let Role::Start(family) = items[start].kind.role() else {
            continue;
        };
        let level = items[start].nest_level;
        let partner = (start + 1..items.len()).find(|&j| {
            items[j].pair_line.is_none()
                && items[j].kind.role() == Role::End(family)
                && items[j].nest_level == level
        });
        if let Some(end) = partner {
            items[start].pair_line = Some(items[end].line);
            items[end].pair_line = Some(items[start].line);
        }
    }
}

/// Lines of start or end markers left without a partner.
pub fn unpaired(items: &[ListingItem]) -> Vec<usize> {
    items
        .iter()
        .filter(|item| matches!(item.kind.role(), Role::Start(_) | Role::End(_)))
        .filter(|item| item.pair_line.is_none())
        .map(|item| item.line)
        .collect()
}

/// Flattens a command tree into listing order, then levels and pairs it.
pub fn flatten(nodes: &[CommandNode]) -> Vec<ListingItem> {
    let mut items = Vec::new();
    for node in nodes {
        push_node(node, &mut items);
    }
    // A tree always produces balanced markers.
    if compute_nesting(&mut items).is_ok() {
        pair_markers(&mut items);
    }
    items
}

fn push_node(node: &CommandNode, items: &mut Vec<ListingItem>) {
    let push = |items: &mut Vec<ListingItem>, kind| {
        let mut item = ListingItem::new(items.len() + 1, kind);
        item.node_id = Some(node.id);
        item.enabled = node.enabled;
        items.push(item);
    };

    let ty = node.command_type();
    push(items, ListingKind::Command(ty));
    if ty.is_conditional() {
        for child in node.children(BLOCK_THEN) {
            push_node(child, items);
        }
        let otherwise = node.children(BLOCK_ELSE);
        if !otherwise.is_empty() {
            push(items, ListingKind::Else);
            for child in otherwise {
                push_node(child, items);
            }
        }
        push(items, ListingKind::EndIf);
    } else if ty.is_loop() {
        for child in node.children(BLOCK_BODY) {
            push_node(child, items);
        }
        push(items, ListingKind::EndLoop);
    }
}

/// Indented text listing, one line per item.
pub fn render(items: &[ListingItem], script: &MacroScript) -> String {
    let mut out = String::new();
    for item in items {
        let summary = match (item.kind, item.node_id.and_then(|id| script.find(id))) {
            (ListingKind::Command(_), Some(node)) => node.kind.summary(),
            _ => String::new(),
        };
        let _ = write!(
            out,
            "{:>4} {}{}{}",
            item.line,
            "  ".repeat(item.nest_level),
            if item.enabled { "" } else { "# " },
            item.kind.label()
        );
        if !summary.is_empty() {
            let _ = write!(out, " {}", summary);
        }
        if let Some(pair) = item.pair_line {
            let _ = write!(out, "  -> {}", pair);
        }
        out.push('\n');
    }
    out
}
