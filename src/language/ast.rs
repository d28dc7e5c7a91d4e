use crate::language::span::Location;
use std::fmt;

/// Stable identity of a node in the program arena. Ids start at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32 + 1)
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw > 0).then_some(NodeId(raw))
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Module,
    Function,
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub functions: Vec<NodeId>,
}

/// Pre-parsed literal value.
#[derive(Clone, Debug, PartialEq)]
pub enum Immediate {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Immediate {
    pub fn type_name(&self) -> &'static str {
        match self {
            Immediate::Bool(_) => "bool",
            Immediate::Int(_) => "int",
            Immediate::Float(_) => "float",
            Immediate::Str(_) => "string",
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Bool(v) => write!(f, "{v}"),
            Immediate::Int(v) => write!(f, "{v}"),
            Immediate::Float(v) => write!(f, "{v}"),
            Immediate::Str(v) => write!(f, "\"{v}\""),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Print,
    Tuple,
    Len,
    Index,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Add => "add",
            Primitive::Sub => "sub",
            Primitive::Mul => "mul",
            Primitive::Div => "div",
            Primitive::Mod => "mod",
            Primitive::Neg => "neg",
            Primitive::Eq => "eq",
            Primitive::Ne => "ne",
            Primitive::Lt => "lt",
            Primitive::Le => "le",
            Primitive::Gt => "gt",
            Primitive::Ge => "ge",
            Primitive::And => "and",
            Primitive::Or => "or",
            Primitive::Not => "not",
            Primitive::Print => "print",
            Primitive::Tuple => "tuple",
            Primitive::Len => "len",
            Primitive::Index => "index",
        }
    }

    /// Operand count, `None` for variadic primitives.
    pub fn arity(self) -> Option<usize> {
        match self {
            Primitive::Neg | Primitive::Not | Primitive::Len => Some(1),
            Primitive::Print | Primitive::Tuple => None,
            _ => Some(2),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOp {
    Invoke,
    Move,
    Primitive(Primitive),
}

#[derive(Clone, Debug)]
pub struct CallExpr {
    pub callee: Option<NodeId>,
    pub args: Vec<NodeId>,
    pub op: CallOp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpaqueKind {
    Cast,
    MemberAccess,
    Reduce,
    Named,
    Import,
}

#[derive(Clone, Debug)]
pub struct FnDecl {
    pub params: Vec<NodeId>,
    pub body: NodeId,
}

#[derive(Clone, Debug)]
pub enum SymbolKind {
    Var { immediate: Option<Immediate> },
    Fn(FnDecl),
    Type,
    Module,
    Enum,
    Label { target: Option<NodeId> },
    Unresolved,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub global: bool,
}

impl Symbol {
    pub fn as_function(&self) -> Option<&FnDecl> {
        match &self.kind {
            SymbolKind::Fn(decl) => Some(decl),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Nop,
    ExprStmt {
        expr: NodeId,
    },
    Return {
        expr: Option<NodeId>,
    },
    Block {
        body: Vec<NodeId>,
    },
    While {
        cond: NodeId,
        body: NodeId,
        test_first: bool,
    },
    For {
        index: NodeId,
        iterator: NodeId,
        body: NodeId,
    },
    Cond {
        cond: NodeId,
        then_stmt: NodeId,
        else_stmt: Option<NodeId>,
    },
    Select {
        scrutinee: NodeId,
        whens: Vec<NodeId>,
    },
    When {
        body: NodeId,
    },
    Label {
        label: NodeId,
    },
    Goto {
        label: NodeId,
    },
    SymRef {
        symbol: NodeId,
    },
    Def {
        symbol: NodeId,
    },
    Call(CallExpr),
    CondExpr {
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    Opaque(OpaqueKind),
    Symbol(Symbol),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Nop => "Stmt",
            NodeKind::ExprStmt { .. } => "ExprStmt",
            NodeKind::Return { .. } => "ReturnStmt",
            NodeKind::Block { .. } => "BlockStmt",
            NodeKind::While { .. } => "WhileLoopStmt",
            NodeKind::For { .. } => "ForLoopStmt",
            NodeKind::Cond { .. } => "CondStmt",
            NodeKind::Select { .. } => "SelectStmt",
            NodeKind::When { .. } => "WhenStmt",
            NodeKind::Label { .. } => "LabelStmt",
            NodeKind::Goto { .. } => "GotoStmt",
            NodeKind::SymRef { .. } => "SymExpr",
            NodeKind::Def { .. } => "DefExpr",
            NodeKind::Call(_) => "CallExpr",
            NodeKind::CondExpr { .. } => "CondExpr",
            NodeKind::Opaque(OpaqueKind::Cast) => "CastExpr",
            NodeKind::Opaque(OpaqueKind::MemberAccess) => "MemberAccessExpr",
            NodeKind::Opaque(OpaqueKind::Reduce) => "ReduceExpr",
            NodeKind::Opaque(OpaqueKind::Named) => "NamedExpr",
            NodeKind::Opaque(OpaqueKind::Import) => "ImportExpr",
            NodeKind::Symbol(symbol) => match symbol.kind {
                SymbolKind::Var { .. } => "VarSymbol",
                SymbolKind::Fn(_) => "FnSymbol",
                SymbolKind::Type => "TypeSymbol",
                SymbolKind::Module => "ModuleSymbol",
                SymbolKind::Enum => "EnumSymbol",
                SymbolKind::Label { .. } => "LabelSymbol",
                SymbolKind::Unresolved => "UnresolvedSymbol",
            },
        }
    }

    pub fn is_stmt(&self) -> bool {
        matches!(
            self,
            NodeKind::Nop
                | NodeKind::ExprStmt { .. }
                | NodeKind::Return { .. }
                | NodeKind::Block { .. }
                | NodeKind::While { .. }
                | NodeKind::For { .. }
                | NodeKind::Cond { .. }
                | NodeKind::Select { .. }
                | NodeKind::When { .. }
                | NodeKind::Label { .. }
                | NodeKind::Goto { .. }
        )
    }

    pub fn is_expr(&self) -> bool {
        matches!(
            self,
            NodeKind::SymRef { .. }
                | NodeKind::Def { .. }
                | NodeKind::Call(_)
                | NodeKind::CondExpr { .. }
                | NodeKind::Opaque(_)
        )
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub location: Location,
    pub scope: ScopeId,
    pub parent_stmt: Option<NodeId>,
    pub next: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Module {
    pub name: String,
    pub symbol: NodeId,
    pub stmts: Vec<NodeId>,
}

impl Module {
    pub fn first_stmt(&self) -> Option<NodeId> {
        self.stmts.first().copied()
    }
}

/// A fully resolved program. Nodes live in one arena and are addressed by
/// [`NodeId`]; nothing is freed while the program is alive.
#[derive(Clone, Debug)]
pub struct Program {
    pub(crate) nodes: Vec<Node>,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) modules: Vec<Module>,
    pub(crate) entry: Option<NodeId>,
}

impl Program {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn entry(&self) -> Option<NodeId> {
        self.entry
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn symbol(&self, id: NodeId) -> Option<&Symbol> {
        match &self.get(id)?.kind {
            NodeKind::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    pub fn function(&self, id: NodeId) -> Option<(&Symbol, &FnDecl)> {
        let symbol = self.symbol(id)?;
        symbol.as_function().map(|decl| (symbol, decl))
    }

    pub fn is_global(&self, id: NodeId) -> bool {
        self.symbol(id).map_or(false, |symbol| symbol.global)
    }

    /// Short display name: the symbol name for symbols, the kind otherwise.
    pub fn display_name(&self, id: NodeId) -> String {
        match self.get(id) {
            Some(Node {
                kind: NodeKind::Symbol(symbol),
                ..
            }) => symbol.name.clone(),
            Some(node) => node.kind.name().to_string(),
            None => format!("<unknown {}>", id),
        }
    }

    /// All functions named `name` visible from `scope`, innermost scope first.
    pub fn visible_functions(&self, scope: ScopeId, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            for function in &scope.functions {
                if self.symbol(*function).map_or(false, |s| s.name == name) {
                    found.push(*function);
                }
            }
            current = scope.parent;
        }
        found
    }

    /// Direct children of a node, in evaluation order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).kind {
            NodeKind::Nop | NodeKind::Opaque(_) => Vec::new(),
            NodeKind::ExprStmt { expr } => vec![*expr],
            NodeKind::Return { expr } => expr.iter().copied().collect(),
            NodeKind::Block { body } => body.clone(),
            NodeKind::While { cond, body, .. } => vec![*cond, *body],
            NodeKind::For {
                index,
                iterator,
                body,
            } => vec![*index, *iterator, *body],
            NodeKind::Cond {
                cond,
                then_stmt,
                else_stmt,
            } => {
                let mut out = vec![*cond, *then_stmt];
                out.extend(else_stmt.iter().copied());
                out
            }
            NodeKind::Select { scrutinee, whens } => {
                let mut out = vec![*scrutinee];
                out.extend(whens.iter().copied());
                out
            }
            NodeKind::When { body } => vec![*body],
            NodeKind::Label { label } | NodeKind::Goto { label } => vec![*label],
            NodeKind::SymRef { symbol } | NodeKind::Def { symbol } => vec![*symbol],
            NodeKind::Call(call) => {
                let mut out: Vec<NodeId> = call.callee.iter().copied().collect();
                out.extend(call.args.iter().copied());
                out
            }
            NodeKind::CondExpr {
                cond,
                then_expr,
                else_expr,
            } => vec![*cond, *then_expr, *else_expr],
            NodeKind::Symbol(symbol) => match &symbol.kind {
                SymbolKind::Fn(decl) => {
                    let mut out = decl.params.clone();
                    out.push(decl.body);
                    out
                }
                _ => Vec::new(),
            },
        }
    }

    /// Every node reachable from the module's statements, including the
    /// symbols they reference and the bodies of the functions they define.
    /// Symbol nodes are not descended through references, only definitions.
    pub fn collect_module(&self, module: &Module) -> Vec<NodeId> {
        let mut emitted = vec![false; self.nodes.len()];
        let mut expanded = vec![false; self.nodes.len()];
        let mut out = Vec::new();
        let mut pending: Vec<(NodeId, bool)> = module
            .stmts
            .iter()
            .rev()
            .map(|stmt| (*stmt, true))
            .collect();
        pending.push((module.symbol, true));
        while let Some((id, expand)) = pending.pop() {
            if !std::mem::replace(&mut emitted[id.index()], true) {
                out.push(id);
            }
            if !expand || std::mem::replace(&mut expanded[id.index()], true) {
                continue;
            }
            match &self.node(id).kind {
                NodeKind::SymRef { symbol } | NodeKind::Goto { label: symbol } => {
                    pending.push((*symbol, false));
                }
                _ => pending.extend(self.children(id).into_iter().rev().map(|c| (c, true))),
            }
        }
        out
    }

    /// Enclosing statements of `stmt`, outermost first.
    pub fn enclosing_stmts(&self, stmt: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.node(stmt).parent_stmt;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent_stmt;
        }
        chain.reverse();
        chain
    }

    /// The `DefExpr` wrapped by an expression statement, if any.
    pub fn defined_by(&self, stmt: NodeId) -> Option<NodeId> {
        match &self.node(stmt).kind {
            NodeKind::ExprStmt { expr } => match self.node(*expr).kind {
                NodeKind::Def { .. } => Some(*expr),
                _ => None,
            },
            _ => None,
        }
    }
}
