use crate::block::{ArithOp, Block, BlockKind, CompareOp, LogicOp};
use crate::variables::VariableRegistry;
use tracing::debug;

const LIST_CREATE_SLOTS: usize = 3;
const DICT_CREATE_PAIRS: usize = 2;
const TUPLE_CREATE_SLOTS: usize = 2;

/// Renders a value-producing block as a Python expression.
///
/// Returns `None` only when no block is connected. Missing sub-inputs are
/// replaced by the placeholder literal appropriate for their slot.
pub fn render_expr(block: Option<&Block>, vars: &VariableRegistry) -> Option<String> {
    let block = block?;
    let input = |name: &str, default: &str| {
        render_expr(block.input(name), vars).unwrap_or_else(|| default.to_string())
    };
    let code = match &block.kind {
        BlockKind::VariableGet => vars.resolve(block.variable_field("VAR")),
        BlockKind::VariableSet => format!(
            "{} = {}",
            vars.resolve(block.variable_field("VAR")),
            input("VALUE", "None")
        ),
        BlockKind::Compare => {
            let op = CompareOp::from_selector(block.text_field("OP"));
            format!("{} {} {}", input("A", "0"), op.symbol(), input("B", "0"))
        }
        BlockKind::LogicOperation => {
            let op = LogicOp::from_selector(block.text_field("OP"));
            format!(
                "{} {} {}",
                input("A", "False"),
                op.keyword(),
                input("B", "False")
            )
        }
        BlockKind::Boolean => {
            if block.text_field("BOOL") == Some("TRUE") {
                "True".to_string()
            } else {
                "False".to_string()
            }
        }
        BlockKind::Number => number_literal(block.text_field("NUM")),
        BlockKind::Arithmetic => {
            let op = ArithOp::from_selector(block.text_field("OP"));
            format!("{} {} {}", input("A", "0"), op.symbol(), input("B", "0"))
        }
        BlockKind::Round => format!("round({})", input("VALUE", "0")),
        BlockKind::Text => quote_str(block.text_field("TEXT").unwrap_or_default()),
        BlockKind::Print => format!("print({})", input("VALUE", "\"\"")),
        BlockKind::ListCreate => {
            let items = (0..LIST_CREATE_SLOTS)
                .map(|i| input(&format!("ITEM{}", i), "None"))
                .collect::<Vec<_>>();
            format!("[{}]", items.join(", "))
        }
        BlockKind::ListGet => format!("{}[{}]", input("LIST", "[]"), input("INDEX", "0")),
        BlockKind::ListSet => format!(
            "{}[{}] = {}",
            input("LIST", "[]"),
            input("INDEX", "0"),
            input("VALUE", "None")
        ),
        BlockKind::DictCreate => {
            let entries = (0..DICT_CREATE_PAIRS)
                .map(|i| {
                    format!(
                        "{}: {}",
                        input(&format!("KEY{}", i), "\"\""),
                        input(&format!("VALUE{}", i), "None")
                    )
                })
                .collect::<Vec<_>>();
            format!("{{{}}}", entries.join(", "))
        }
        BlockKind::DictGet => format!("{}[{}]", input("DICT", "{}"), input("KEY", "\"\"")),
        BlockKind::DictSet => format!(
            "{}[{}] = {}",
            input("DICT", "{}"),
            input("KEY", "\"\""),
            input("VALUE", "None")
        ),
        BlockKind::TupleCreate => {
            let items = (0..TUPLE_CREATE_SLOTS)
                .map(|i| input(&format!("ITEM{}", i), "None"))
                .collect::<Vec<_>>();
            format!("({})", items.join(", "))
        }
        BlockKind::TupleGet => format!("{}[{}]", input("TUPLE", "()"), input("INDEX", "0")),
        BlockKind::InputText => format!(
            "input({})",
            quote_str(block.text_field("PROMPT").unwrap_or_default())
        ),
        BlockKind::If
        | BlockKind::IfElse
        | BlockKind::IfElifElse
        | BlockKind::ForRange
        | BlockKind::While
        | BlockKind::Import
        | BlockKind::Unknown(_) => {
            let kind = block.kind.type_name();
            debug!(kind, id = %block.id, "unsupported block in value position");
            unsupported_comment(&block.kind)
        }
    };
    Some(code)
}

pub fn unsupported_comment(kind: &BlockKind) -> String {
    format!("# Unsupported block type: {}", kind.type_name())
}

/// Double-quoted Python string literal that always fits on one line.
pub fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn number_literal(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return "0".to_string();
    };
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => raw.to_string(),
        _ => "0".to_string(),
    }
}
