use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Field through which variable kinds name their variable.
pub const VARIABLE_FIELD: &str = "VAR";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub String);

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for VarId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for VarId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    If,
    IfElse,
    IfElifElse,
    ForRange,
    While,
    Import,
    VariableGet,
    VariableSet,
    Compare,
    LogicOperation,
    Boolean,
    Number,
    Arithmetic,
    Round,
    Text,
    Print,
    ListCreate,
    ListGet,
    ListSet,
    DictCreate,
    DictGet,
    DictSet,
    TupleCreate,
    TupleGet,
    InputText,
    Unknown(String),
}

impl BlockKind {
    pub fn from_type(tag: &str) -> Self {
        match tag {
            "controls_if" => Self::If,
            "controls_if_else" => Self::IfElse,
            "controls_ifelseif" => Self::IfElifElse,
            "controls_for" => Self::ForRange,
            "controls_whileUntil" => Self::While,
            "import_statement" => Self::Import,
            "variables_get" => Self::VariableGet,
            "variables_set" => Self::VariableSet,
            "logic_compare" => Self::Compare,
            "logic_operation" => Self::LogicOperation,
            "logic_boolean" => Self::Boolean,
            "math_number" => Self::Number,
            "math_arithmetic" => Self::Arithmetic,
            "math_round" => Self::Round,
            "text" => Self::Text,
            "text_print" => Self::Print,
            "lists_create_with" => Self::ListCreate,
            "lists_getIndex" => Self::ListGet,
            "lists_setIndex" => Self::ListSet,
            "dict_create" => Self::DictCreate,
            "dict_get" => Self::DictGet,
            "dict_set" => Self::DictSet,
            "tuple_create" => Self::TupleCreate,
            "tuple_get" => Self::TupleGet,
            "input_text" => Self::InputText,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::If => "controls_if",
            Self::IfElse => "controls_if_else",
            Self::IfElifElse => "controls_ifelseif",
            Self::ForRange => "controls_for",
            Self::While => "controls_whileUntil",
            Self::Import => "import_statement",
            Self::VariableGet => "variables_get",
            Self::VariableSet => "variables_set",
            Self::Compare => "logic_compare",
            Self::LogicOperation => "logic_operation",
            Self::Boolean => "logic_boolean",
            Self::Number => "math_number",
            Self::Arithmetic => "math_arithmetic",
            Self::Round => "math_round",
            Self::Text => "text",
            Self::Print => "text_print",
            Self::ListCreate => "lists_create_with",
            Self::ListGet => "lists_getIndex",
            Self::ListSet => "lists_setIndex",
            Self::DictCreate => "dict_create",
            Self::DictGet => "dict_get",
            Self::DictSet => "dict_set",
            Self::TupleCreate => "tuple_create",
            Self::TupleGet => "tuple_get",
            Self::InputText => "input_text",
            Self::Unknown(tag) => tag,
        }
    }

    pub fn has_variable_field(&self) -> bool {
        matches!(self, Self::VariableGet | Self::VariableSet | Self::ForRange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some("NEQ") => Self::Neq,
            Some("LT") => Self::Lt,
            Some("LTE") => Self::Lte,
            Some("GT") => Self::Gt,
            Some("GTE") => Self::Gte,
            _ => Self::Eq,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some(s) if s.eq_ignore_ascii_case("OR") => Self::Or,
            _ => Self::And,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Minus,
    Multiply,
    Divide,
}

impl ArithOp {
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some("MINUS") => Self::Minus,
            Some("MULTIPLY") => Self::Multiply,
            Some("DIVIDE") => Self::Divide,
            _ => Self::Add,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Minus => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Variable(VarId),
}

impl Field {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            Field::Variable(_) => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VarId> {
        match self {
            Field::Variable(id) => Some(id),
            Field::Text(_) => None,
        }
    }
}

/// One node of the visual program.
///
/// `inputs` hold value-producing sub-blocks, `statements` hold the heads of
/// nested bodies, and `next` continues the current statement chain. The tree
/// owns its children, so chains cannot form cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub fields: BTreeMap<String, Field>,
    pub inputs: BTreeMap<String, Block>,
    pub statements: BTreeMap<String, Block>,
    pub next: Option<Box<Block>>,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            fields: BTreeMap::new(),
            inputs: BTreeMap::new(),
            statements: BTreeMap::new(),
            next: None,
        }
    }

    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), Field::Text(value.into()));
        self
    }

    pub fn with_variable(mut self, name: &str, var: VarId) -> Self {
        self.fields.insert(name.to_string(), Field::Variable(var));
        self
    }

    pub fn with_input(mut self, name: &str, block: Block) -> Self {
        self.inputs.insert(name.to_string(), block);
        self
    }

    pub fn with_statement(mut self, name: &str, block: Block) -> Self {
        self.statements.insert(name.to_string(), block);
        self
    }

    pub fn with_next(mut self, block: Block) -> Self {
        self.next = Some(Box::new(block));
        self
    }

    pub fn input(&self, name: &str) -> Option<&Block> {
        self.inputs.get(name)
    }

    pub fn statement(&self, name: &str) -> Option<&Block> {
        self.statements.get(name)
    }

    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Field::as_text)
    }

    pub fn variable_field(&self, name: &str) -> Option<&VarId> {
        self.fields.get(name).and_then(Field::as_variable)
    }

    pub fn find(&self, id: &BlockId) -> Option<&Block> {
        if &self.id == id {
            return Some(self);
        }
        self.children().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        if &self.id == id {
            return Some(self);
        }
        for child in self.inputs.values_mut() {
            if let Some(found) = child.find_mut(id) {
                return Some(found);
            }
        }
        for child in self.statements.values_mut() {
            if let Some(found) = child.find_mut(id) {
                return Some(found);
            }
        }
        self.next.as_deref_mut().and_then(|next| next.find_mut(id))
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.find(id).is_some()
    }

    /// Last block of the chain starting here.
    pub fn tail_mut(&mut self) -> &mut Block {
        match self.next {
            Some(ref mut next) => next.tail_mut(),
            None => self,
        }
    }

    pub fn references_variable(&self, var: &VarId) -> bool {
        self.fields.values().any(|field| field.as_variable() == Some(var))
    }

    /// Calls `f` on this block and every block beneath it.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Block)) {
        f(self);
        for child in self.inputs.values_mut() {
            child.walk_mut(f);
        }
        for child in self.statements.values_mut() {
            child.walk_mut(f);
        }
        if let Some(next) = self.next.as_deref_mut() {
            next.walk_mut(f);
        }
    }

    pub fn walk(&self, f: &mut dyn FnMut(&Block)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    fn children(&self) -> impl Iterator<Item = &Block> {
        self.inputs
            .values()
            .chain(self.statements.values())
            .chain(self.next.as_deref())
    }
}
