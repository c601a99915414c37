//! Blockly-style XML encoding of a [`Workspace`].
//!
//! ```xml
//! <xml>
//!   <variables><variable id="var_1">i</variable></variables>
//!   <block type="controls_for" id="block_1" x="20" y="20">
//!     <field name="VAR" id="var_1">i</field>
//!     <value name="FROM"><block type="math_number" id="block_2"><field name="NUM">0</field></block></value>
//!     <statement name="DO">...</statement>
//!     <next>...</next>
//!   </block>
//! </xml>
//! ```

use crate::block::{Block, BlockId, BlockKind, Field, VarId, VARIABLE_FIELD};
use crate::variables::VariableRegistry;
use crate::workspace::{Position, TopBlock, Workspace};
use std::collections::HashSet;
use std::io::Cursor;
use thiserror::Error;
use xmltree::{Element, EmitterConfig, ParserConfig, XMLNode};

const ROOT_TAG: &str = "xml";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentError {
    #[error("invalid document XML: {0}")]
    Xml(String),
    #[error("expected <xml> root element, found <{0}>")]
    UnexpectedRoot(String),
    #[error("<{element}> element is missing the '{attribute}' attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    #[error("block id '{0}' appears more than once")]
    DuplicateBlockId(String),
    #[error("failed to write document: {0}")]
    Write(String),
}

pub fn encode(workspace: &Workspace) -> Result<String, DocumentError> {
    let mut root = Element::new(ROOT_TAG);
    if !workspace.variables().is_empty() {
        let mut vars = Element::new("variables");
        for variable in workspace.variables().all() {
            let mut el = Element::new("variable");
            el.attributes.insert("id".to_string(), variable.id.0.clone());
            el.children.push(XMLNode::Text(variable.resolved_name.clone()));
            vars.children.push(XMLNode::Element(el));
        }
        root.children.push(XMLNode::Element(vars));
    }
    for top in workspace.top_blocks() {
        let mut el = encode_block(&top.block, workspace.variables());
        if let Some(position) = top.position {
            el.attributes.insert("x".to_string(), format_num(position.x));
            el.attributes.insert("y".to_string(), format_num(position.y));
        }
        root.children.push(XMLNode::Element(el));
    }

    let mut out = Vec::new();
    let config = EmitterConfig::new()
        .perform_indent(true)
        .write_document_declaration(false);
    root.write_with_config(&mut out, config)
        .map_err(|e| DocumentError::Write(e.to_string()))?;
    String::from_utf8(out).map_err(|e| DocumentError::Write(e.to_string()))
}

/// Builds a fresh workspace from document text.
///
/// Variables are taken exactly as declared; run
/// [`Workspace::sanitize_variables`] afterwards to normalize their names.
/// Field text is kept verbatim, including whitespace-only values.
pub fn decode(text: &str) -> Result<Workspace, DocumentError> {
    let config = ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(true);
    let root = Element::parse_with_config(Cursor::new(text.as_bytes()), config)
        .map_err(|e| DocumentError::Xml(e.to_string()))?;
    if root.name != ROOT_TAG {
        return Err(DocumentError::UnexpectedRoot(root.name));
    }

    let mut decoder = Decoder::default();
    if let Some(vars) = root.get_child("variables") {
        for el in child_elements(vars).filter(|el| el.name == "variable") {
            let name = element_text(el);
            match el.attributes.get("id") {
                Some(id) => {
                    decoder.variables.insert_declared(VarId(id.clone()), &name);
                }
                None => {
                    decoder.variables.register_or_rename(&name);
                }
            }
        }
    }

    let mut top = Vec::new();
    for el in child_elements(&root).filter(|el| is_block_tag(el)) {
        let block = decoder.block(el)?;
        let position = match (parse_coord(el, "x"), parse_coord(el, "y")) {
            (Some(x), Some(y)) => Some(Position::new(x, y)),
            _ => None,
        };
        top.push(TopBlock { block, position });
    }
    Ok(Workspace::with_parts(top, decoder.variables))
}

#[derive(Default)]
struct Decoder {
    variables: VariableRegistry,
    seen_ids: HashSet<String>,
    minted: usize,
}

impl Decoder {
    fn block(&mut self, el: &Element) -> Result<Block, DocumentError> {
        let tag = el
            .attributes
            .get("type")
            .ok_or_else(|| DocumentError::MissingAttribute {
                element: el.name.clone(),
                attribute: "type",
            })?;
        let kind = BlockKind::from_type(tag);
        let id = match el.attributes.get("id") {
            Some(id) => {
                if !self.seen_ids.insert(id.clone()) {
                    return Err(DocumentError::DuplicateBlockId(id.clone()));
                }
                BlockId(id.clone())
            }
            None => self.mint_id(),
        };
        let mut block = Block::new(id, kind);

        for child in child_elements(el) {
            match child.name.as_str() {
                "field" => {
                    let name = required_name(child)?;
                    let field = self.field(child, &block.kind, &name);
                    block.fields.insert(name, field);
                }
                "value" => {
                    let name = required_name(child)?;
                    if let Some(inner) = slot_block(child) {
                        let inner = self.block(inner)?;
                        block.inputs.insert(name, inner);
                    }
                }
                "statement" => {
                    let name = required_name(child)?;
                    if let Some(inner) = slot_block(child) {
                        let inner = self.block(inner)?;
                        block.statements.insert(name, inner);
                    }
                }
                "next" => {
                    if let Some(inner) = slot_block(child) {
                        block.next = Some(Box::new(self.block(inner)?));
                    }
                }
                _ => {}
            }
        }
        Ok(block)
    }

    fn field(&mut self, el: &Element, kind: &BlockKind, name: &str) -> Field {
        let text = element_text(el);
        if let Some(id) = el.attributes.get("id") {
            let id = VarId(id.clone());
            // An undeclared handle without a name stays dangling.
            if self.variables.get(&id).is_none() && !text.is_empty() {
                self.variables.insert_declared(id.clone(), &text);
            }
            return Field::Variable(id);
        }
        if name == VARIABLE_FIELD && kind.has_variable_field() {
            return Field::Variable(self.variables.bind_name(&text));
        }
        Field::Text(text)
    }

    fn mint_id(&mut self) -> BlockId {
        loop {
            self.minted += 1;
            let candidate = format!("doc_block_{}", self.minted);
            if self.seen_ids.insert(candidate.clone()) {
                return BlockId(candidate);
            }
        }
    }
}

fn encode_block(block: &Block, vars: &VariableRegistry) -> Element {
    let mut el = Element::new("block");
    let type_name = block.kind.type_name().to_string();
    el.attributes.insert("type".to_string(), type_name);
    el.attributes.insert("id".to_string(), block.id.0.clone());
    for (name, field) in &block.fields {
        let mut f = Element::new("field");
        f.attributes.insert("name".to_string(), name.clone());
        match field {
            Field::Text(text) => {
                if !text.is_empty() {
                    f.children.push(XMLNode::Text(text.clone()));
                }
            }
            Field::Variable(id) => {
                f.attributes.insert("id".to_string(), id.0.clone());
                let name = vars
                    .get(id)
                    .map(|v| v.resolved_name.clone())
                    .unwrap_or_default();
                if !name.is_empty() {
                    f.children.push(XMLNode::Text(name));
                }
            }
        }
        el.children.push(XMLNode::Element(f));
    }
    for (name, child) in &block.inputs {
        el.children.push(XMLNode::Element(slot("value", name, child, vars)));
    }
    for (name, child) in &block.statements {
        let statement = slot("statement", name, child, vars);
        el.children.push(XMLNode::Element(statement));
    }
    if let Some(next) = block.next.as_deref() {
        let mut n = Element::new("next");
        n.children.push(XMLNode::Element(encode_block(next, vars)));
        el.children.push(XMLNode::Element(n));
    }
    el
}

fn slot(tag: &str, name: &str, child: &Block, vars: &VariableRegistry) -> Element {
    let mut el = Element::new(tag);
    el.attributes.insert("name".to_string(), name.to_string());
    el.children.push(XMLNode::Element(encode_block(child, vars)));
    el
}

fn child_elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(XMLNode::as_element)
}

fn is_block_tag(el: &Element) -> bool {
    el.name == "block" || el.name == "shadow"
}

/// A real block wins over the shadow that sits under it.
fn slot_block(el: &Element) -> Option<&Element> {
    child_elements(el)
        .find(|c| c.name == "block")
        .or_else(|| child_elements(el).find(|c| c.name == "shadow"))
}

fn required_name(el: &Element) -> Result<String, DocumentError> {
    el.attributes
        .get("name")
        .cloned()
        .ok_or_else(|| DocumentError::MissingAttribute {
            element: el.name.clone(),
            attribute: "name",
        })
}

fn element_text(el: &Element) -> String {
    el.get_text().map(|t| t.into_owned()).unwrap_or_default()
}

fn parse_coord(el: &Element, name: &str) -> Option<f64> {
    el.attributes
        .get(name)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn format_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
