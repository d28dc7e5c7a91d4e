use crate::language::ast::{NodeId, Program, ScopeId};
use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    value::Slot,
};

/// Maps an evaluated callee to the function it invokes.
///
/// Named selectors are resolved against every function of that name visible
/// from `scope`, keeping those that accept `nargs` arguments. Exactly one must
/// remain.
pub fn resolve_callee(
    program: &Program,
    scope: ScopeId,
    callee: &Slot,
    nargs: usize,
) -> RuntimeResult<NodeId> {
    match callee {
        Slot::Symbol(id) => {
            let (symbol, decl) = program.function(*id).ok_or_else(|| RuntimeError::NotCallable {
                found: format!("symbol {}", program.display_name(*id)),
            })?;
            if decl.params.len() != nargs {
                return Err(RuntimeError::ArityMismatch {
                    name: symbol.name.clone(),
                    expected: decl.params.len(),
                    received: nargs,
                });
            }
            Ok(*id)
        }
        Slot::Selector(name) => {
            let matching: Vec<NodeId> = program
                .visible_functions(scope, name)
                .into_iter()
                .filter(|function| {
                    program
                        .function(*function)
                        .map_or(false, |(_, decl)| decl.params.len() == nargs)
                })
                .collect();
            match matching.as_slice() {
                [single] => Ok(*single),
                _ => Err(RuntimeError::UnresolvedCall {
                    name: name.clone(),
                    arity: nargs,
                    candidates: matching.len(),
                }),
            }
        }
        // TODO: bind captured cells into the callee environment once closures
        // are produced by the front end.
        Slot::Closure(_) => Err(RuntimeError::internal("closures not handled yet")),
        other => {
            other.check_initialized()?;
            Err(RuntimeError::NotCallable {
                found: other.kind_name().to_string(),
            })
        }
    }
}
