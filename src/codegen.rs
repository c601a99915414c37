use crate::stmt::render_stmt;
use crate::variables::VariableRegistry;
use crate::workspace::{TopBlock, Workspace};
use std::cmp::Ordering;
use tracing::trace;

pub const EMPTY_PROGRAM: &str = "# No code generated\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopLevelOrder {
    /// Order in which chains entered the workspace.
    #[default]
    Insertion,
    /// Top-to-bottom, then left-to-right on the canvas.
    Visual,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    pub order: TopLevelOrder,
}

pub fn emit_workspace(workspace: &Workspace, options: EmitOptions) -> String {
    emit_program(workspace.top_blocks(), workspace.variables(), options)
}

/// Renders every top-level chain at indent 0 and joins them.
pub fn emit_program(top: &[TopBlock], vars: &VariableRegistry, options: EmitOptions) -> String {
    if top.is_empty() {
        return EMPTY_PROGRAM.to_string();
    }
    let mut ordered = top.iter().collect::<Vec<_>>();
    if options.order == TopLevelOrder::Visual {
        ordered.sort_by(|a, b| visual_order(a, b));
    }
    let mut code = String::new();
    for chain in ordered {
        let kind = chain.block.kind.type_name();
        trace!(block = %chain.block.id, kind, "emitting top-level chain");
        code.push_str(&render_stmt(&chain.block, 0, vars));
    }
    code
}

fn visual_order(a: &TopBlock, b: &TopBlock) -> Ordering {
    match (a.position, b.position) {
        (Some(pa), Some(pb)) => pa
            .y
            .total_cmp(&pb.y)
            .then(pa.x.total_cmp(&pb.x))
            .then_with(|| a.block.id.cmp(&b.block.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
