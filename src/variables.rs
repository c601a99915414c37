use crate::block::{Block, Field, VarId};
use crate::ident::sanitize;
use tracing::{debug, info};

const UNKNOWN_VARIABLE_NAME: &str = "var1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub id: VarId,
    /// Name as it was last supplied by the editor or a document.
    pub declared_name: String,
    /// Emit-ready identifier backing the handle.
    pub resolved_name: String,
}

/// Maps variable handles to the identifiers the generator emits.
///
/// Variables created through [`VariableRegistry::register_or_rename`] are
/// sanitized on entry and share a handle when their sanitized names collide.
/// Variables loaded verbatim from a document keep their declared name until
/// [`VariableRegistry::sanitize_existing`] migrates them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableRegistry {
    variables: Vec<Variable>,
    id_counter: usize,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, id: &VarId) -> Option<&Variable> {
        self.variables.iter().find(|v| &v.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.resolved_name == name)
    }

    /// Identifier for `id`, or `var1` when the handle is unknown.
    pub fn resolve(&self, id: Option<&VarId>) -> String {
        self.lookup(id)
            .unwrap_or_else(|| UNKNOWN_VARIABLE_NAME.to_string())
    }

    /// Identifier for `id` when the handle names a known variable.
    pub fn lookup(&self, id: Option<&VarId>) -> Option<String> {
        let id = id?;
        let index = self.variables.iter().position(|v| &v.id == id)?;
        Some(sanitize(
            Some(&self.variables[index].resolved_name),
            index,
        ))
    }

    /// Admits a new variable under its sanitized name.
    ///
    /// If another variable already holds that name its handle is returned
    /// and nothing is created.
    pub fn register_or_rename(&mut self, raw: &str) -> VarId {
        let resolved = sanitize(Some(raw), self.variables.len());
        if resolved != raw {
            info!(declared = raw, resolved = %resolved, "sanitized variable name on creation");
        }
        if let Some(existing) = self.find_by_name(&resolved) {
            debug!(name = %resolved, id = %existing.id, "variable name already registered");
            return existing.id.clone();
        }
        let id = self.new_id();
        self.variables.push(Variable {
            id: id.clone(),
            declared_name: raw.to_string(),
            resolved_name: resolved,
        });
        id
    }

    /// Handle for a variable referred to by name rather than by handle.
    ///
    /// Matches an existing identifier first, otherwise registers `raw`.
    pub fn bind_name(&mut self, raw: &str) -> VarId {
        match self.find_by_name(raw).map(|v| v.id.clone()) {
            Some(id) => id,
            None => self.register_or_rename(raw),
        }
    }

    /// Inserts a variable exactly as a document declared it.
    ///
    /// Returns false when the handle is already taken.
    pub fn insert_declared(&mut self, id: VarId, name: &str) -> bool {
        if self.get(&id).is_some() {
            return false;
        }
        self.variables.push(Variable {
            id,
            declared_name: name.to_string(),
            resolved_name: name.to_string(),
        });
        true
    }

    /// Renames `id`, returning the handle that now carries the new name.
    ///
    /// A rename onto a name held by another variable merges the two: the
    /// caller must migrate references from `id` to the returned handle.
    pub fn rename(&mut self, id: &VarId, raw: &str) -> Option<VarId> {
        let index = self.variables.iter().position(|v| &v.id == id)?;
        let resolved = sanitize(Some(raw), index);
        if let Some(holder) = self
            .variables
            .iter()
            .find(|v| v.resolved_name == resolved && &v.id != id)
        {
            return Some(holder.id.clone());
        }
        let variable = &mut self.variables[index];
        variable.declared_name = raw.to_string();
        variable.resolved_name = resolved;
        Some(id.clone())
    }

    pub fn remove(&mut self, id: &VarId) -> Option<Variable> {
        let index = self.variables.iter().position(|v| &v.id == id)?;
        Some(self.variables.remove(index))
    }

    /// Brings every variable in line with the sanitizer.
    ///
    /// A variable whose name is not already sanitized is replaced by one
    /// registered under the sanitized name (or merged into the variable
    /// already holding it), every `VAR` reference in `blocks` is rewritten
    /// to the replacement, and the original is deleted. Returns the number
    /// of variables replaced.
    pub fn sanitize_existing(&mut self, blocks: &mut [Block]) -> usize {
        let snapshot = self.variables.clone();
        let mut replaced = 0;
        for (index, original) in snapshot.iter().enumerate() {
            let sanitized = sanitize(Some(&original.resolved_name), index);
            let holder = self
                .variables
                .iter()
                .find(|v| v.resolved_name == sanitized && v.id != original.id)
                .map(|v| v.id.clone());
            if sanitized == original.resolved_name && holder.is_none() {
                continue;
            }
            info!(
                from = %original.resolved_name,
                to = %sanitized,
                "sanitizing existing variable"
            );
            let replacement = match holder {
                Some(holder) => holder,
                None => {
                    let id = self.new_id();
                    self.variables.push(Variable {
                        id: id.clone(),
                        declared_name: original.declared_name.clone(),
                        resolved_name: sanitized,
                    });
                    id
                }
            };
            rewrite_references(blocks, &original.id, &replacement);
            self.remove(&original.id);
            replaced += 1;
        }
        replaced
    }

    fn new_id(&mut self) -> VarId {
        loop {
            self.id_counter += 1;
            let candidate = VarId(format!("var_{}", self.id_counter));
            if self.get(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

/// Points every variable field referencing `from` at `to`.
pub fn rewrite_references(blocks: &mut [Block], from: &VarId, to: &VarId) {
    for block in blocks {
        block.walk_mut(&mut |b| {
            for field in b.fields.values_mut() {
                if matches!(field, Field::Variable(id) if id == from) {
                    *field = Field::Variable(to.clone());
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;

    fn getter(id: &str, var: &VarId) -> Block {
        Block::new(id, BlockKind::VariableGet).with_variable("VAR", var.clone())
    }

    #[test]
    fn unknown_handle_resolves_to_var1() {
        let registry = VariableRegistry::new();
        assert_eq!(registry.resolve(None), "var1");
        assert_eq!(registry.resolve(Some(&VarId::from("nope"))), "var1");
    }

    #[test]
    fn registration_sanitizes_names() {
        let mut registry = VariableRegistry::new();
        let id = registry.register_or_rename("2x");
        assert_eq!(registry.resolve(Some(&id)), "_2x");
        assert_eq!(registry.get(&id).unwrap().declared_name, "2x");
    }

    #[test]
    fn colliding_names_share_one_identifier() {
        let mut registry = VariableRegistry::new();
        let a = registry.register_or_rename("my var");
        let b = registry.register_or_rename("my-var");
        assert_eq!(registry.resolve(Some(&a)), "my_var");
        assert_eq!(registry.resolve(Some(&b)), "my_var");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn migration_replaces_and_rewrites_references() {
        let mut registry = VariableRegistry::new();
        let bad = VarId::from("legacy");
        assert!(registry.insert_declared(bad.clone(), "my score"));
        let good = VarId::from("ok");
        assert!(registry.insert_declared(good.clone(), "total"));

        let mut blocks = vec![
            getter("g1", &bad),
            Block::new("s1", BlockKind::VariableSet)
                .with_variable("VAR", bad.clone())
                .with_input("VALUE", getter("g2", &good)),
        ];
        let replaced = registry.sanitize_existing(&mut blocks);
        assert_eq!(replaced, 1);
        assert!(registry.get(&bad).is_none());

        let new_id = registry.find_by_name("my_score").unwrap().id.clone();
        assert_eq!(blocks[0].variable_field("VAR"), Some(&new_id));
        assert_eq!(blocks[1].variable_field("VAR"), Some(&new_id));
        assert_eq!(
            blocks[1].input("VALUE").unwrap().variable_field("VAR"),
            Some(&good)
        );
    }

    #[test]
    fn migration_merges_colliding_declared_names() {
        let mut registry = VariableRegistry::new();
        registry.insert_declared(VarId::from("a"), "my var");
        registry.insert_declared(VarId::from("b"), "my-var");
        let mut blocks = vec![
            getter("g1", &VarId::from("a")),
            getter("g2", &VarId::from("b")),
        ];
        registry.sanitize_existing(&mut blocks);
        assert_eq!(registry.len(), 1);
        assert_eq!(blocks[0].variable_field("VAR"), blocks[1].variable_field("VAR"));
        assert_eq!(registry.resolve(blocks[0].variable_field("VAR")), "my_var");
    }

    #[test]
    fn rename_onto_held_name_reports_holder() {
        let mut registry = VariableRegistry::new();
        let a = registry.register_or_rename("alpha");
        let b = registry.register_or_rename("beta");
        assert_eq!(registry.rename(&b, "alpha"), Some(a));
        let gamma = registry.rename(&b, "gam ma").unwrap();
        assert_eq!(gamma, b);
        assert_eq!(registry.resolve(Some(&b)), "gam_ma");
    }

    #[test]
    fn binding_by_name_reuses_existing_variables() {
        let mut registry = VariableRegistry::new();
        let score = registry.register_or_rename("score");
        assert_eq!(registry.bind_name("score"), score);
        assert_eq!(registry.bind_name("sco re"), registry.bind_name("sco_re"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn minted_ids_skip_declared_ones() {
        let mut registry = VariableRegistry::new();
        registry.insert_declared(VarId::from("var_1"), "taken");
        let id = registry.register_or_rename("fresh");
        assert_ne!(id, VarId::from("var_1"));
    }
}
