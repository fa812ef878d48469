//! The Node type and its closed kind enumeration (C1, data model §3).
//!
//! Every syntactic element of the source language is one `Node`. The kind
//! enumeration below covers literal kinds, binder kinds, control kinds,
//! operator kinds, and module kinds, plus the two synthetic kinds `Root`
//! and `ChangeScopeRoot` used internally by the arena and the change
//! tracker.

use strum_macros::{Display, EnumString};

use crate::ids::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[non_exhaustive]
pub enum NodeKind {
    // Synthetic kinds.
    Root,
    ChangeScopeRoot,

    // Module / top-level kinds.
    Script,
    ModuleImport,
    ModuleExport,

    // Literal kinds.
    NumberLit,
    StringLit,
    TemplateLit,
    BooleanLit,
    NullLit,
    RegexpLit,
    ArrayLit,
    ObjectLit,
    ObjectProperty,

    // Binder kinds.
    VarDecl,
    LetDecl,
    ConstDecl,
    FunctionDecl,
    ClassDecl,
    Parameter,
    CatchParameter,
    ImportBinding,

    // Control kinds.
    Block,
    If,
    For,
    ForIn,
    ForOf,
    While,
    DoWhile,
    Switch,
    SwitchCase,
    Try,
    Catch,
    Finally,
    Return,
    Break,
    Continue,
    Throw,
    Labeled,

    // Expression / operator kinds.
    Name,
    GetProp,
    GetElem,
    Call,
    New,
    Assign,
    AssignOp,
    BinaryOp,
    UnaryOp,
    LogicalAnd,
    LogicalOr,
    NullishCoalesce,
    OptionalChainCall,
    OptionalChainGetProp,
    Conditional,
    ArrowFunction,
    FunctionExpr,
    ClassExpr,
    ThisExpr,
    SuperExpr,
    SpreadExpr,
    Comma,
    Await,
    Yield,
    TaggedTemplate,
    Destructuring,
    StaticBlock,
    ExprStatement,
}

impl NodeKind {
    /// Change scopes per the data model §3: "the top-level SCRIPT and any
    /// FUNCTION/ARROW_FUNCTION/STATIC_BLOCK".
    pub fn is_change_scope(self) -> bool {
        matches!(
            self,
            NodeKind::Script
                | NodeKind::FunctionDecl
                | NodeKind::FunctionExpr
                | NodeKind::ArrowFunction
                | NodeKind::StaticBlock
        )
    }

    /// Basic-block boundary kinds per §4.3: function/arrow body start,
    /// if/else branches, loop bodies, switch/case, the second operand of
    /// `||`/`&&`/`??`, the second operand of `?.`-call, ternary arms.
    pub fn introduces_basic_block(self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDecl
                | NodeKind::FunctionExpr
                | NodeKind::ArrowFunction
                | NodeKind::If
                | NodeKind::For
                | NodeKind::ForIn
                | NodeKind::ForOf
                | NodeKind::While
                | NodeKind::DoWhile
                | NodeKind::SwitchCase
                | NodeKind::LogicalAnd
                | NodeKind::LogicalOr
                | NodeKind::NullishCoalesce
                | NodeKind::OptionalChainCall
                | NodeKind::Conditional
        )
    }
}

/// The inline payload carried by literal and identifier nodes. Most kinds
/// carry `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Str(String),
    Num(f64),
}

impl Payload {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Payload::Num(n) => Some(*n),
            _ => None,
        }
    }
}

/// The closed set of boolean bits a Node may carry (data model §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeBits {
    pub is_synthetic: bool,
    pub is_const_name: bool,
    pub is_arrow: bool,
    pub is_static_member: bool,
    pub is_generator: bool,
    pub is_async: bool,
    pub is_computed_key: bool,
    pub is_optional_chain_link: bool,
    pub is_class_field: bool,
    /// This `ObjectProperty` is a getter or setter, not a plain value
    /// property. C8/C9/C10 treat any accessor on a property name as a
    /// collapse/devirtualize hazard (spec §4.7 condition 5, §4.9).
    pub is_accessor: bool,
}

/// Every syntactic element of a compilation. Owned exclusively by the
/// arena (C1); every other component holds a `NodeId`, never a `&Node`
/// across a mutation boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub payload: Payload,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub source_ref: Option<crate::sourcemap::SourceRef>,
    pub annotation_ref: Option<NodeId>,
    pub color_ref: Option<NodeId>,
    pub bits: NodeBits,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            payload: Payload::None,
            children: Vec::new(),
            parent: None,
            source_ref: None,
            annotation_ref: None,
            color_ref: None,
            bits: NodeBits::default(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_children(mut self, children: Vec<NodeId>) -> Self {
        self.children = children;
        self
    }
}
