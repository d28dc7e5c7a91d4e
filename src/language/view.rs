use crate::language::ast::{CallOp, NodeId, NodeKind, Program, SymbolKind};
use std::fmt::Write;

/// One-line s-expression view of the subtree rooted at `id`. With `show_ids`
/// every node is suffixed with its id so it can be used in `bi`/`print`.
pub fn render(program: &Program, id: NodeId, show_ids: bool) -> String {
    let mut out = String::new();
    write_node(program, id, show_ids, &mut out);
    out
}

fn write_node(program: &Program, id: NodeId, show_ids: bool, out: &mut String) {
    let Some(node) = program.get(id) else {
        let _ = write!(out, "<unknown {}>", id);
        return;
    };
    let tag = |out: &mut String| {
        if show_ids {
            let _ = write!(out, "#{}", id);
        }
    };
    match &node.kind {
        NodeKind::Symbol(symbol) => {
            match &symbol.kind {
                SymbolKind::Var {
                    immediate: Some(value),
                } => {
                    let _ = write!(out, "{value}");
                }
                _ => out.push_str(&symbol.name),
            }
            tag(out);
        }
        NodeKind::SymRef { symbol } => {
            write_node(program, *symbol, show_ids, out);
        }
        NodeKind::Block { body } => {
            out.push('{');
            tag(out);
            for stmt in body {
                out.push(' ');
                write_node(program, *stmt, show_ids, out);
            }
            out.push_str(" }");
        }
        kind => {
            out.push('(');
            out.push_str(&head(kind));
            tag(out);
            for child in program.children(id) {
                out.push(' ');
                write_node(program, child, show_ids, out);
            }
            out.push(')');
        }
    }
}

fn head(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Nop => "nop".into(),
        NodeKind::ExprStmt { .. } => "expr".into(),
        NodeKind::Return { .. } => "return".into(),
        NodeKind::While {
            test_first: true, ..
        } => "while".into(),
        NodeKind::While { .. } => "do-while".into(),
        NodeKind::For { .. } => "for".into(),
        NodeKind::Cond { .. } => "if".into(),
        NodeKind::Select { .. } => "select".into(),
        NodeKind::When { .. } => "when".into(),
        NodeKind::Label { .. } => "label".into(),
        NodeKind::Goto { .. } => "goto".into(),
        NodeKind::Def { .. } => "def".into(),
        NodeKind::Call(call) => match call.op {
            CallOp::Invoke => "call".into(),
            CallOp::Move => "move".into(),
            CallOp::Primitive(primitive) => primitive.name().into(),
        },
        NodeKind::CondExpr { .. } => "?:".into(),
        other => other.name().to_string(),
    }
}
