use crate::block::{Block, BlockKind};
use crate::expr::{render_expr, unsupported_comment};
use crate::variables::VariableRegistry;
use tracing::debug;

const INDENT_UNIT: &str = "  ";
const DEFAULT_LOOP_VARIABLE: &str = "i";

/// Renders `block` and the rest of its chain at `indent_level`.
///
/// Every emitted line ends with `\n`. Bodies are rendered one level deeper
/// and an empty body becomes a single `pass`.
pub fn render_stmt(block: &Block, indent_level: usize, vars: &VariableRegistry) -> String {
    let mut out = String::new();
    let mut current = Some(block);
    while let Some(block) = current {
        render_single(block, indent_level, vars, &mut out);
        current = block.next.as_deref();
    }
    out
}

/// Renders the statement slot `name` of `block` as an indented body.
pub fn render_body(
    block: &Block,
    name: &str,
    indent_level: usize,
    vars: &VariableRegistry,
) -> String {
    match block.statement(name) {
        Some(head) => render_stmt(head, indent_level, vars),
        None => format!("{}pass\n", indent(indent_level)),
    }
}

fn render_single(block: &Block, level: usize, vars: &VariableRegistry, out: &mut String) {
    let pad = indent(level);
    let value = |name: &str, default: &str| {
        render_expr(block.input(name), vars).unwrap_or_else(|| default.to_string())
    };
    match &block.kind {
        BlockKind::If => {
            push_line(out, &pad, format!("if {}:", value("IF0", "False")));
            out.push_str(&render_body(block, "DO0", level + 1, vars));
        }
        BlockKind::IfElse => {
            push_line(out, &pad, format!("if {}:", value("IF0", "False")));
            out.push_str(&render_body(block, "DO0", level + 1, vars));
            push_line(out, &pad, "else:".to_string());
            out.push_str(&render_body(block, "ELSE", level + 1, vars));
        }
        BlockKind::IfElifElse => {
            push_line(out, &pad, format!("if {}:", value("IF0", "False")));
            out.push_str(&render_body(block, "DO0", level + 1, vars));
            push_line(out, &pad, format!("elif {}:", value("IF1", "False")));
            out.push_str(&render_body(block, "DO1", level + 1, vars));
            push_line(out, &pad, "else:".to_string());
            out.push_str(&render_body(block, "ELSE", level + 1, vars));
        }
        BlockKind::ForRange => {
            let var = vars
                .lookup(block.variable_field("VAR"))
                .unwrap_or_else(|| DEFAULT_LOOP_VARIABLE.to_string());
            push_line(out, &pad, format!(
                "for {} in range({}, {} + 1):",
                var,
                value("FROM", "0"),
                value("TO", "0")
            ));
            out.push_str(&render_body(block, "DO", level + 1, vars));
        }
        BlockKind::While => {
            push_line(out, &pad, format!("while {}:", value("BOOL", "False")));
            out.push_str(&render_body(block, "DO", level + 1, vars));
        }
        BlockKind::Import => {
            push_line(out, &pad, format!(
                "import {}",
                block.text_field("MODULE").unwrap_or_default()
            ));
        }
        BlockKind::VariableSet => {
            push_line(out, &pad, format!(
                "{} = {}",
                vars.resolve(block.variable_field("VAR")),
                value("VALUE", "None")
            ));
        }
        BlockKind::Print => push_line(out, &pad, format!("print({})", value("VALUE", "\"\""))),
        BlockKind::ListSet => push_line(out, &pad, format!(
            "{}[{}] = {}",
            value("LIST", "[]"),
            value("INDEX", "0"),
            value("VALUE", "None")
        )),
        BlockKind::DictSet => push_line(out, &pad, format!(
            "{}[{}] = {}",
            value("DICT", "{}"),
            value("KEY", "\"\""),
            value("VALUE", "None")
        )),
        BlockKind::VariableGet
        | BlockKind::Compare
        | BlockKind::LogicOperation
        | BlockKind::Boolean
        | BlockKind::Number
        | BlockKind::Arithmetic
        | BlockKind::Round
        | BlockKind::Text
        | BlockKind::ListCreate
        | BlockKind::ListGet
        | BlockKind::DictCreate
        | BlockKind::DictGet
        | BlockKind::TupleCreate
        | BlockKind::TupleGet
        | BlockKind::InputText => {
            // A loose reporter still reads as an expression statement.
            if let Some(expr) = render_expr(Some(block), vars) {
                push_line(out, &pad, expr);
            }
        }
        BlockKind::Unknown(_) => {
            debug!(kind = block.kind.type_name(), id = %block.id, "unsupported statement block");
            push_line(out, &pad, unsupported_comment(&block.kind));
        }
    }
}

fn push_line(out: &mut String, pad: &str, text: String) {
    out.push_str(pad);
    out.push_str(&text);
    out.push('\n');
}

fn indent(level: usize) -> String {
    INDENT_UNIT.repeat(level)
}
