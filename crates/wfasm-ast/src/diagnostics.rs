//! Compile-time diagnostics raised by the scoping, resolution, and
//! annotation-validation passes.

use thiserror::Error;

use crate::ast::RouteEntry;

fn format_route(route: &[RouteEntry]) -> String {
    if route.is_empty() {
        return "<root>".to_string();
    }
    route
        .iter()
        .map(|e| match e.index {
            Some(i) => format!("{}[{i}]", e.key),
            None => e.key.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// A compile error raised through [`crate::path::Path::raise`]-style
/// constructors during scoping or reference resolution.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("unresolved identifier `{name}` at {}", format_route(.route))]
    UnresolvedIdentifier { name: String, route: Vec<RouteEntry> },
    #[error("`{name}` is already bound in this scope, at {}", format_route(.route))]
    DuplicateBinding { name: String, route: Vec<RouteEntry> },
    #[error("{message}, at {}", format_route(.route))]
    CompilationError { message: String, route: Vec<RouteEntry> },
}
