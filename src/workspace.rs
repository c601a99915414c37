//! The program graph edited in one session.
//!
//! A [`Workspace`] owns the top-level statement chains, their canvas
//! positions and the variable registry. All mutations the editor can make
//! go through the methods here so the registry and the block fields never
//! disagree about variable handles.

use crate::block::{Block, BlockId, Field, VarId, VARIABLE_FIELD};
use crate::variables::{rewrite_references, VariableRegistry};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Where a moved block lands.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    TopLevel(Position),
    Next { of: BlockId },
    Input { parent: BlockId, name: String },
    Statement { parent: BlockId, name: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error("no block with id '{0}'")]
    UnknownBlock(BlockId),
    #[error("no variable with id '{0}'")]
    UnknownVariable(VarId),
    #[error("cannot attach block '{moved}' inside its own subtree at '{target}'")]
    CyclicAttachment { moved: BlockId, target: BlockId },
    #[error("a block with id '{0}' already exists")]
    DuplicateBlock(BlockId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopBlock {
    pub block: Block,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workspace {
    top: Vec<TopBlock>,
    variables: VariableRegistry,
    id_counter: usize,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parts(top: Vec<TopBlock>, variables: VariableRegistry) -> Self {
        Self {
            top,
            variables,
            id_counter: 0,
        }
    }

    pub fn top_blocks(&self) -> &[TopBlock] {
        &self.top
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty()
    }

    pub fn find(&self, id: &BlockId) -> Option<&Block> {
        self.top.iter().find_map(|t| t.block.find(id))
    }

    pub fn block_count(&self) -> usize {
        let mut count = 0;
        for top in &self.top {
            top.block.walk(&mut |_| count += 1);
        }
        count
    }

    /// Mints a block id unused anywhere in the graph.
    pub fn new_block_id(&mut self) -> BlockId {
        loop {
            self.id_counter += 1;
            let candidate = BlockId(format!("block_{}", self.id_counter));
            if self.find(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Adds a new chain at the top level.
    ///
    /// Every id in the chain must be new to the graph and unique within the
    /// chain. `VAR` fields given as plain names are bound to variables.
    pub fn add_top_block(
        &mut self,
        mut block: Block,
        position: Option<Position>,
    ) -> Result<(), WorkspaceError> {
        let mut seen = HashSet::new();
        let mut duplicate = None;
        block.walk(&mut |b| {
            let repeated = !seen.insert(b.id.clone()) || self.find(&b.id).is_some();
            if duplicate.is_none() && repeated {
                duplicate = Some(b.id.clone());
            }
        });
        if let Some(id) = duplicate {
            return Err(WorkspaceError::DuplicateBlock(id));
        }
        let variables = &mut self.variables;
        block.walk_mut(&mut |b| {
            if !b.kind.has_variable_field() {
                return;
            }
            let Some(Field::Text(name)) = b.fields.get(VARIABLE_FIELD) else {
                return;
            };
            let id = variables.bind_name(name);
            b.fields.insert(VARIABLE_FIELD.to_string(), Field::Variable(id));
        });
        self.top.push(TopBlock { block, position });
        Ok(())
    }

    /// Deletes a block with everything plugged into it.
    ///
    /// Blocks chained below it move up into the vacated slot.
    pub fn remove_block(&mut self, id: &BlockId) -> Result<Block, WorkspaceError> {
        let mut removed = self.detach(id, true)?;
        removed.next = None;
        Ok(removed)
    }

    /// Moves a block, together with the chain below it, to `placement`.
    ///
    /// Dropping into a statement slot or below a block splices the moved
    /// chain in front of whatever was there. Dropping into an occupied
    /// value input bumps the previous occupant to the top level.
    pub fn move_block(&mut self, id: &BlockId, placement: Placement) -> Result<(), WorkspaceError> {
        let moving = self
            .find(id)
            .ok_or_else(|| WorkspaceError::UnknownBlock(id.clone()))?;
        if let Some(target) = placement_target(&placement) {
            if moving.contains(target) {
                return Err(WorkspaceError::CyclicAttachment {
                    moved: id.clone(),
                    target: target.clone(),
                });
            }
            if self.find(target).is_none() {
                return Err(WorkspaceError::UnknownBlock(target.clone()));
            }
        }

        let previous_position = self
            .top
            .iter()
            .find(|t| &t.block.id == id)
            .and_then(|t| t.position);
        let chain = self.detach(id, false)?;
        debug!(block = %id, ?placement, "moving block");
        let attached = match placement {
            Placement::TopLevel(position) => {
                self.top.push(TopBlock {
                    block: chain,
                    position: Some(position),
                });
                return Ok(());
            }
            Placement::Next { of } => self.attach(&of, chain, |target, mut chain| {
                if let Some(displaced) = target.next.take() {
                    chain.tail_mut().next = Some(displaced);
                }
                target.next = Some(Box::new(chain));
                None
            }),
            Placement::Statement { parent, name } => {
                self.attach(&parent, chain, move |target, mut chain| {
                    if let Some(displaced) = target.statements.remove(&name) {
                        chain.tail_mut().next = Some(Box::new(displaced));
                    }
                    target.statements.insert(name, chain);
                    None
                })
            }
            Placement::Input { parent, name } => {
                self.attach(&parent, chain, move |target, chain| {
                    target.inputs.insert(name, chain)
                })
            }
        };
        match attached {
            Ok(Some(bumped)) => {
                self.top.push(TopBlock {
                    block: bumped,
                    position: None,
                });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err((chain, target)) => {
                self.top.push(TopBlock {
                    block: chain,
                    position: previous_position,
                });
                Err(WorkspaceError::UnknownBlock(target))
            }
        }
    }

    /// Sets one field; a plain name in a `VAR` field is bound to a variable.
    pub fn set_field(
        &mut self,
        id: &BlockId,
        name: &str,
        field: Field,
    ) -> Result<(), WorkspaceError> {
        let binds_variable = self
            .find(id)
            .ok_or_else(|| WorkspaceError::UnknownBlock(id.clone()))?
            .kind
            .has_variable_field()
            && name == VARIABLE_FIELD;
        let field = match field {
            Field::Text(text) if binds_variable => {
                Field::Variable(self.variables.bind_name(&text))
            }
            other => other,
        };
        if let Some(block) = self.find_mut(id) {
            block.fields.insert(name.to_string(), field);
        }
        Ok(())
    }

    pub fn create_variable(&mut self, name: &str) -> VarId {
        self.variables.register_or_rename(name)
    }

    /// Renames a variable; a rename onto a held name merges the two.
    pub fn rename_variable(&mut self, id: &VarId, name: &str) -> Result<VarId, WorkspaceError> {
        let holder = self
            .variables
            .rename(id, name)
            .ok_or_else(|| WorkspaceError::UnknownVariable(id.clone()))?;
        if &holder != id {
            self.migrate_variable(id, &holder);
        }
        Ok(holder)
    }

    /// Deletes a variable and every block that references it.
    pub fn delete_variable(&mut self, id: &VarId) -> Result<(), WorkspaceError> {
        if self.variables.get(id).is_none() {
            return Err(WorkspaceError::UnknownVariable(id.clone()));
        }
        while let Some(user) = self.first_user_of(id) {
            self.remove_block(&user)?;
        }
        self.variables.remove(id);
        Ok(())
    }

    /// Runs the registry's start-of-session sanitization over this graph.
    pub fn sanitize_variables(&mut self) -> usize {
        let (mut blocks, positions) = self.split_top();
        let replaced = self.variables.sanitize_existing(&mut blocks);
        self.join_top(blocks, positions);
        replaced
    }

    fn migrate_variable(&mut self, from: &VarId, to: &VarId) {
        let (mut blocks, positions) = self.split_top();
        rewrite_references(&mut blocks, from, to);
        self.join_top(blocks, positions);
        self.variables.remove(from);
    }

    fn split_top(&mut self) -> (Vec<Block>, Vec<Option<Position>>) {
        std::mem::take(&mut self.top)
            .into_iter()
            .map(|t| (t.block, t.position))
            .unzip()
    }

    fn join_top(&mut self, blocks: Vec<Block>, positions: Vec<Option<Position>>) {
        self.top = blocks
            .into_iter()
            .zip(positions)
            .map(|(block, position)| TopBlock { block, position })
            .collect();
    }

    fn first_user_of(&self, var: &VarId) -> Option<BlockId> {
        let mut found = None;
        for top in &self.top {
            top.block.walk(&mut |b| {
                if found.is_none() && b.references_variable(var) {
                    found = Some(b.id.clone());
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    fn find_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.top.iter_mut().find_map(|t| t.block.find_mut(id))
    }

    fn attach(
        &mut self,
        target: &BlockId,
        chain: Block,
        plug: impl FnOnce(&mut Block, Block) -> Option<Block>,
    ) -> Result<Option<Block>, (Block, BlockId)> {
        match self.find_mut(target) {
            Some(block) => Ok(plug(block, chain)),
            None => Err((chain, target.clone())),
        }
    }

    /// Unplugs a block from wherever it sits.
    ///
    /// With `heal`, the chain below it takes its place and the returned
    /// block keeps only its own subtree; otherwise the chain comes along.
    fn detach(&mut self, id: &BlockId, heal: bool) -> Result<Block, WorkspaceError> {
        if let Some(index) = self.top.iter().position(|t| &t.block.id == id) {
            let mut top = self.top.remove(index);
            if heal {
                if let Some(rest) = top.block.next.take() {
                    self.top.insert(
                        index,
                        TopBlock {
                            block: *rest,
                            position: top.position,
                        },
                    );
                }
            }
            return Ok(top.block);
        }
        for top in &mut self.top {
            if let Some(block) = take_from(&mut top.block, id, heal) {
                return Ok(block);
            }
        }
        Err(WorkspaceError::UnknownBlock(id.clone()))
    }
}

fn placement_target(placement: &Placement) -> Option<&BlockId> {
    match placement {
        Placement::TopLevel(_) => None,
        Placement::Next { of } => Some(of),
        Placement::Input { parent, .. } | Placement::Statement { parent, .. } => Some(parent),
    }
}

fn take_from(block: &mut Block, id: &BlockId, heal: bool) -> Option<Block> {
    if let Some(key) = slot_key(&block.inputs, id) {
        let mut taken = block.inputs.remove(&key)?;
        if heal {
            if let Some(rest) = taken.next.take() {
                block.inputs.insert(key, *rest);
            }
        }
        return Some(taken);
    }
    if let Some(key) = slot_key(&block.statements, id) {
        let mut taken = block.statements.remove(&key)?;
        if heal {
            if let Some(rest) = taken.next.take() {
                block.statements.insert(key, *rest);
            }
        }
        return Some(taken);
    }
    if block.next.as_ref().is_some_and(|next| &next.id == id) {
        let mut taken = *block.next.take()?;
        if heal {
            block.next = taken.next.take();
        }
        return Some(taken);
    }
    for child in block.inputs.values_mut() {
        if let Some(found) = take_from(child, id, heal) {
            return Some(found);
        }
    }
    for child in block.statements.values_mut() {
        if let Some(found) = take_from(child, id, heal) {
            return Some(found);
        }
    }
    block
        .next
        .as_deref_mut()
        .and_then(|next| take_from(next, id, heal))
}

fn slot_key(slots: &BTreeMap<String, Block>, id: &BlockId) -> Option<String> {
    slots
        .iter()
        .find(|(_, child)| &child.id == id)
        .map(|(key, _)| key.clone())
}
