//! Construction of resolved programs.
//!
//! The interpreter consumes an AST that has already been parsed, resolved and
//! typed. `ProgramBuilder` produces that shape directly: every reference is
//! bound to a symbol node, statements are linked to their siblings and to
//! their enclosing statement, and functions are registered in the lexical
//! scope that declares them.

use crate::language::{
    ast::{
        CallExpr, CallOp, FnDecl, Immediate, Module, Node, NodeId, NodeKind, OpaqueKind,
        Primitive, Program, Scope, ScopeId, ScopeKind, Symbol, SymbolKind,
    },
    span::Location,
};
use std::rc::Rc;

pub struct ProgramBuilder {
    nodes: Vec<Node>,
    scopes: Vec<Scope>,
    modules: Vec<Module>,
    entry: Option<NodeId>,
    scope_stack: Vec<ScopeId>,
    file: Option<Rc<str>>,
    line: u32,
}

impl ProgramBuilder {
    pub fn new(file: &str) -> Self {
        Self {
            nodes: Vec::new(),
            scopes: vec![Scope {
                kind: ScopeKind::Root,
                parent: None,
                functions: Vec::new(),
            }],
            modules: Vec::new(),
            entry: None,
            scope_stack: vec![ScopeId(0)],
            file: Some(Rc::from(file)),
            line: 0,
        }
    }

    /// Line recorded on nodes created from now on.
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    pub fn finish(self) -> Program {
        Program {
            nodes: self.nodes,
            scopes: self.scopes,
            modules: self.modules,
            entry: self.entry,
        }
    }

    pub fn set_entry(&mut self, function: NodeId) {
        self.entry = Some(function);
    }

    fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().unwrap_or(&ScopeId(0))
    }

    fn push_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent: Some(self.current_scope()),
            functions: Vec::new(),
        });
        self.scope_stack.push(id);
        id
    }

    fn pop_scope(&mut self) {
        if self.scope_stack.len() > 1 {
            self.scope_stack.pop();
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            id,
            kind,
            location: Location::new(self.file.clone(), self.line),
            scope: self.current_scope(),
            parent_stmt: None,
            next: None,
        });
        id
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    fn adopt(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent_stmt = Some(parent);
    }

    fn link(&mut self, stmts: &[NodeId]) {
        for pair in stmts.windows(2) {
            self.node_mut(pair[0]).next = Some(pair[1]);
        }
    }

    fn symbol(&mut self, name: &str, kind: SymbolKind) -> NodeId {
        let global = self.scopes[self.current_scope().0 as usize].kind == ScopeKind::Module;
        self.alloc(NodeKind::Symbol(Symbol {
            name: name.to_string(),
            kind,
            global,
        }))
    }

    // ---- symbols ----

    pub fn var(&mut self, name: &str) -> NodeId {
        self.symbol(name, SymbolKind::Var { immediate: None })
    }

    pub fn constant(&mut self, value: Immediate) -> NodeId {
        let name = value.to_string();
        self.symbol(
            &name,
            SymbolKind::Var {
                immediate: Some(value),
            },
        )
    }

    pub fn unresolved(&mut self, name: &str) -> NodeId {
        self.symbol(name, SymbolKind::Unresolved)
    }

    pub fn type_symbol(&mut self, name: &str) -> NodeId {
        self.symbol(name, SymbolKind::Type)
    }

    pub fn enum_symbol(&mut self, name: &str) -> NodeId {
        self.symbol(name, SymbolKind::Enum)
    }

    pub fn label(&mut self, name: &str) -> NodeId {
        self.symbol(name, SymbolKind::Label { target: None })
    }

    // ---- expressions ----

    pub fn sym(&mut self, symbol: NodeId) -> NodeId {
        self.alloc(NodeKind::SymRef { symbol })
    }

    pub fn lit(&mut self, value: Immediate) -> NodeId {
        let constant = self.constant(value);
        self.sym(constant)
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.lit(Immediate::Int(value))
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.lit(Immediate::Bool(value))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.lit(Immediate::Str(value.to_string()))
    }

    pub fn def(&mut self, symbol: NodeId) -> NodeId {
        self.alloc(NodeKind::Def { symbol })
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        self.alloc(NodeKind::Call(CallExpr {
            callee: Some(callee),
            args,
            op: CallOp::Invoke,
        }))
    }

    /// Call through a name left for run-time overload resolution.
    pub fn call_named(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let selector = self.unresolved(name);
        let callee = self.sym(selector);
        self.call(callee, args)
    }

    pub fn prim(&mut self, primitive: Primitive, args: Vec<NodeId>) -> NodeId {
        self.alloc(NodeKind::Call(CallExpr {
            callee: None,
            args,
            op: CallOp::Primitive(primitive),
        }))
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        let dst = self.sym(target);
        self.alloc(NodeKind::Call(CallExpr {
            callee: None,
            args: vec![dst, value],
            op: CallOp::Move,
        }))
    }

    pub fn cond_expr(&mut self, cond: NodeId, then_expr: NodeId, else_expr: NodeId) -> NodeId {
        self.alloc(NodeKind::CondExpr {
            cond,
            then_expr,
            else_expr,
        })
    }

    pub fn opaque(&mut self, kind: OpaqueKind) -> NodeId {
        self.alloc(NodeKind::Opaque(kind))
    }

    /// Raw call node; lets producers emit shapes the helpers above refuse.
    pub fn raw_call(&mut self, call: CallExpr) -> NodeId {
        self.alloc(NodeKind::Call(call))
    }

    // ---- statements ----

    pub fn nop(&mut self) -> NodeId {
        self.alloc(NodeKind::Nop)
    }

    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        self.alloc(NodeKind::ExprStmt { expr })
    }

    /// `var name;` as a statement, returning `(stmt, symbol)`.
    pub fn declare(&mut self, name: &str) -> (NodeId, NodeId) {
        let symbol = self.var(name);
        let def = self.def(symbol);
        (self.expr_stmt(def), symbol)
    }

    pub fn assign_stmt(&mut self, target: NodeId, value: NodeId) -> NodeId {
        let call = self.assign(target, value);
        self.expr_stmt(call)
    }

    pub fn ret(&mut self, expr: Option<NodeId>) -> NodeId {
        self.alloc(NodeKind::Return { expr })
    }

    pub fn block(&mut self, body: Vec<NodeId>) -> NodeId {
        self.link(&body);
        let id = self.alloc(NodeKind::Block { body: body.clone() });
        for stmt in body {
            self.adopt(id, stmt);
        }
        id
    }

    pub fn while_do(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        let id = self.alloc(NodeKind::While {
            cond,
            body,
            test_first: true,
        });
        self.adopt(id, body);
        id
    }

    pub fn do_while(&mut self, body: NodeId, cond: NodeId) -> NodeId {
        let id = self.alloc(NodeKind::While {
            cond,
            body,
            test_first: false,
        });
        self.adopt(id, body);
        id
    }

    pub fn for_loop(&mut self, index: NodeId, iterator: NodeId, body: NodeId) -> NodeId {
        let id = self.alloc(NodeKind::For {
            index,
            iterator,
            body,
        });
        self.adopt(id, body);
        id
    }

    pub fn if_stmt(&mut self, cond: NodeId, then_stmt: NodeId, else_stmt: Option<NodeId>) -> NodeId {
        let id = self.alloc(NodeKind::Cond {
            cond,
            then_stmt,
            else_stmt,
        });
        self.adopt(id, then_stmt);
        if let Some(else_stmt) = else_stmt {
            self.adopt(id, else_stmt);
        }
        id
    }

    pub fn when(&mut self, body: NodeId) -> NodeId {
        let id = self.alloc(NodeKind::When { body });
        self.adopt(id, body);
        id
    }

    pub fn select(&mut self, scrutinee: NodeId, whens: Vec<NodeId>) -> NodeId {
        self.link(&whens);
        let id = self.alloc(NodeKind::Select {
            scrutinee,
            whens: whens.clone(),
        });
        for when in whens {
            self.adopt(id, when);
        }
        id
    }

    /// Places `label` at this point of a statement list.
    pub fn label_stmt(&mut self, label: NodeId) -> NodeId {
        let id = self.alloc(NodeKind::Label { label });
        if let NodeKind::Symbol(Symbol {
            kind: SymbolKind::Label { target },
            ..
        }) = &mut self.node_mut(label).kind
        {
            *target = Some(id);
        }
        id
    }

    pub fn goto(&mut self, label: NodeId) -> NodeId {
        self.alloc(NodeKind::Goto { label })
    }

    // ---- definitions ----

    /// Declares a function in the current scope. `body` receives the
    /// parameter symbols and returns the body statements.
    pub fn function(
        &mut self,
        name: &str,
        params: &[&str],
        body: impl FnOnce(&mut Self, &[NodeId]) -> Vec<NodeId>,
    ) -> NodeId {
        let placeholder = self.alloc(NodeKind::Nop);
        let scope = self.current_scope();
        self.push_scope(ScopeKind::Function);
        let params: Vec<NodeId> = params.iter().map(|param| self.var(param)).collect();
        let stmts = body(self, &params);
        let body = self.block(stmts);
        self.pop_scope();
        let global = self.scopes[scope.0 as usize].kind == ScopeKind::Module;
        let node = self.node_mut(placeholder);
        node.kind = NodeKind::Symbol(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Fn(FnDecl { params, body }),
            global,
        });
        self.scopes[scope.0 as usize].functions.push(placeholder);
        placeholder
    }

    /// Function definition statement (`DefExpr` of the function symbol).
    pub fn def_stmt(&mut self, symbol: NodeId) -> NodeId {
        let def = self.def(symbol);
        self.expr_stmt(def)
    }

    pub fn module(&mut self, name: &str, body: impl FnOnce(&mut Self) -> Vec<NodeId>) -> NodeId {
        let symbol = self.symbol(name, SymbolKind::Module);
        self.push_scope(ScopeKind::Module);
        let stmts = body(self);
        self.link(&stmts);
        self.pop_scope();
        self.modules.push(Module {
            name: name.to_string(),
            symbol,
            stmts,
        });
        symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_are_linked_and_adopted() {
        let mut b = ProgramBuilder::new("t.sw");
        let mut ids = Vec::new();
        b.module("m", |b| {
            let a = b.nop();
            let c = b.nop();
            let block = b.block(vec![a, c]);
            ids = vec![a, c, block];
            vec![block]
        });
        let program = b.finish();
        let (a, c, block) = (ids[0], ids[1], ids[2]);
        assert_eq!(program.node(a).next, Some(c));
        assert_eq!(program.node(c).next, None);
        assert_eq!(program.node(a).parent_stmt, Some(block));
        assert_eq!(program.enclosing_stmts(c), vec![block]);
        assert_eq!(program.node(block).parent_stmt, None);
    }

    #[test]
    fn module_symbols_are_global_and_function_locals_are_not() {
        let mut b = ProgramBuilder::new("t.sw");
        let mut syms = Vec::new();
        b.module("m", |b| {
            let (decl, g) = b.declare("g");
            let f = b.function("f", &["p"], |b, params| {
                let (decl, local) = b.declare("local");
                syms.push(params[0]);
                syms.push(local);
                vec![decl]
            });
            syms.push(g);
            syms.push(f);
            let def = b.def_stmt(f);
            vec![decl, def]
        });
        let program = b.finish();
        assert!(!program.is_global(syms[0]));
        assert!(!program.is_global(syms[1]));
        assert!(program.is_global(syms[2]));
        assert!(program.function(syms[3]).is_some());
    }

    #[test]
    fn overloads_are_visible_from_nested_scopes() {
        let mut b = ProgramBuilder::new("t.sw");
        let mut inner_scope = None;
        b.module("m", |b| {
            let one = b.function("f", &["a"], |_, _| Vec::new());
            let two = b.function("f", &["a", "b"], |_, _| Vec::new());
            let g = b.function("g", &[], |b, _| {
                let call = b.call_named("f", Vec::new());
                inner_scope = Some(call);
                vec![b.expr_stmt(call)]
            });
            vec![b.def_stmt(one), b.def_stmt(two), b.def_stmt(g)]
        });
        let program = b.finish();
        let scope = program.node(inner_scope.unwrap()).scope;
        assert_eq!(program.visible_functions(scope, "f").len(), 2);
        assert!(program.visible_functions(scope, "h").is_empty());
    }

    #[test]
    fn module_walk_reaches_function_bodies() {
        let mut b = ProgramBuilder::new("t.sw");
        let mut inner = None;
        b.module("m", |b| {
            let f = b.function("f", &[], |b, _| {
                let zero = b.int(0);
                inner = Some(zero);
                vec![b.ret(Some(zero))]
            });
            vec![b.def_stmt(f)]
        });
        let program = b.finish();
        let walked = program.collect_module(&program.modules()[0]);
        assert!(walked.contains(&inner.unwrap()));
    }
}
