//! The two compiler pre-passes (spec §4.3): build the scope tree and
//! bindings, then resolve every reference identifier against it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Node;
use crate::diagnostics::CompileError;
use crate::path::Path;
use crate::scope::{Binding, BindingKind, Scope};

fn pid(path: &Rc<Path>) -> usize {
    Rc::as_ptr(path) as usize
}

/// The result of running both pre-passes: the path tree plus a binding for
/// every reference identifier, keyed by that identifier's own path.
pub struct Analysis {
    pub root: Rc<Path>,
    scopes: HashMap<usize, Rc<Scope>>,
    references: HashMap<usize, Binding>,
}

impl Analysis {
    /// The scope active at `path`'s own position in the tree.
    pub fn scope_at(&self, path: &Rc<Path>) -> Option<&Rc<Scope>> {
        self.scopes.get(&pid(path))
    }

    /// The binding a reference identifier at `path` resolved to.
    pub fn binding_at(&self, path: &Rc<Path>) -> Option<&Binding> {
        self.references.get(&pid(path))
    }
}

pub fn analyze(root: crate::ast::NodeRef) -> Result<Analysis, CompileError> {
    let path = Path::root(root);
    let mut scopes = HashMap::new();
    let root_scope = Scope::root("s");
    build_scopes(&path, &root_scope, &mut scopes)?;

    let mut references = HashMap::new();
    resolve_references(&path, &mut references, &scopes, true)?;
    validate_annotations(&path)?;

    Ok(Analysis { root: path, scopes, references })
}

fn declare_pattern(path: &Rc<Path>, scope: &Rc<Scope>, scopes: &mut HashMap<usize, Rc<Scope>>) -> Result<(), CompileError> {
    scopes.insert(pid(path), scope.clone());
    match path.node.as_ref() {
        Node::Identifier(name) => {
            let binding = Binding {
                kind: BindingKind::Variable,
                compiled_name: scope.compiled_name(name),
                package: None,
                semver: None,
            };
            scope.declare(name, binding).map_err(|()| path.raise_duplicate_binding(name.clone()))
        }
        Node::ArrayPattern(_) => {
            for child in path.children() {
                declare_pattern(&child, scope, scopes)?;
            }
            Ok(())
        }
        Node::ObjectPattern(_) => {
            for child in path.children() {
                declare_pattern(&child, scope, scopes)?;
            }
            Ok(())
        }
        Node::RestPattern(_) => declare_pattern(&path.get("argument", None).expect("RestPattern has an argument"), scope, scopes),
        Node::AssignmentPattern { .. } => {
            let target = path.get("target", None).expect("AssignmentPattern has a target");
            let default = path.get("default", None).expect("AssignmentPattern has a default");
            declare_pattern(&target, scope, scopes)?;
            // the default value is an expression, evaluated in the enclosing
            // scope; record it so the resolution pass can recurse into it.
            mark_subtree_scope(&default, scope, scopes);
            Ok(())
        }
        Node::EmptyPattern => Ok(()),
        other => unreachable!("declare_pattern called on a non-pattern node: {}", other.kind()),
    }
}

fn mark_subtree_scope(path: &Rc<Path>, scope: &Rc<Scope>, scopes: &mut HashMap<usize, Rc<Scope>>) {
    scopes.insert(pid(path), scope.clone());
    for child in path.children() {
        mark_subtree_scope(&child, scope, scopes);
    }
}

fn build_scopes(path: &Rc<Path>, scope: &Rc<Scope>, scopes: &mut HashMap<usize, Rc<Scope>>) -> Result<(), CompileError> {
    scopes.insert(pid(path), scope.clone());
    match path.node.as_ref() {
        Node::Program(_) => {
            for child in path.children() {
                build_scopes(&child, scope, scopes)?;
            }
            Ok(())
        }
        Node::FunctionDeclaration { name, .. } => {
            // A module function's address is its own declared name, not a
            // scope-qualified locals-map key: it is looked up as `fp`
            // (and the `ObjectFile`'s function key), not read through
            // GETVAR/SETVAR.
            let binding = Binding {
                kind: BindingKind::ModuleFunction,
                compiled_name: name.clone(),
                package: None,
                semver: None,
            };
            scope.declare(name, binding).map_err(|()| path.raise_duplicate_binding(name.clone()))?;

            let fn_scope = Scope::child(scope);
            for param in path.map("params", |p| p.clone()) {
                declare_pattern(&param, &fn_scope, scopes)?;
            }
            if let Some(rest) = path.get("rest", None) {
                declare_pattern(&rest, &fn_scope, scopes)?;
            }
            if let Some(annotation) = path.get("annotation", None) {
                scopes.insert(pid(&annotation), fn_scope.clone());
            }

            // The function body block shares the function's own scope
            // rather than opening a further nested one.
            let body = path.get("body", None).expect("FunctionDeclaration has a body");
            scopes.insert(pid(&body), fn_scope.clone());
            for stmt in body.children() {
                build_scopes(&stmt, &fn_scope, scopes)?;
            }
            Ok(())
        }
        Node::Block(_) => {
            let block_scope = Scope::child(scope);
            for child in path.children() {
                build_scopes(&child, &block_scope, scopes)?;
            }
            Ok(())
        }
        Node::VariableDeclaration(_) => {
            for decl in path.children() {
                let pattern = decl.get("pattern", None).expect("Declarator has a pattern");
                declare_pattern(&pattern, scope, scopes)?;
                if let Some(init) = decl.get("init", None) {
                    build_scopes(&init, scope, scopes)?;
                }
                scopes.insert(pid(&decl), scope.clone());
            }
            Ok(())
        }
        Node::ImportDeclaration { package, .. } => {
            for spec in path.children() {
                if let Node::ImportSpecifier { imported, local, semver } = spec.node.as_ref() {
                    // An imported binding resolves straight to PUSHFN at
                    // every reference site; it never occupies a locals-map
                    // slot, so its address is the remote function's own
                    // name, not a scope-qualified alias.
                    let binding = Binding {
                        kind: BindingKind::ImportedFunction,
                        compiled_name: imported.clone(),
                        package: Some(package.clone()),
                        semver: Some(semver.clone()),
                    };
                    scope.declare(local, binding).map_err(|()| spec.raise_duplicate_binding(local.clone()))?;
                }
                scopes.insert(pid(&spec), scope.clone());
            }
            Ok(())
        }
        Node::ForIn { .. } => {
            // The loop variable is (re-)declared fresh each pass, in the
            // loop's own enclosing scope: `for` does not open a scope of
            // its own (spec §4.3 only lists Program/FunctionDeclaration/
            // non-function Block as scope-opening).
            let left = path.get("left", None).expect("ForIn has a left pattern");
            declare_pattern(&left, scope, scopes)?;
            let right = path.get("right", None).expect("ForIn has a right expression");
            build_scopes(&right, scope, scopes)?;
            let body = path.get("body", None).expect("ForIn has a body");
            build_scopes(&body, scope, scopes)?;
            Ok(())
        }
        _ => {
            for child in path.children() {
                build_scopes(&child, scope, scopes)?;
            }
            Ok(())
        }
    }
}

/// `in_reference_position` is false for subtrees that are declaration
/// targets (patterns) or static member-property names, which the scoping
/// pass already consumed and which must not be looked up.
fn resolve_references(
    path: &Rc<Path>,
    references: &mut HashMap<usize, Binding>,
    scopes: &HashMap<usize, Rc<Scope>>,
    in_reference_position: bool,
) -> Result<(), CompileError> {
    if in_reference_position {
        if let Node::Identifier(name) = path.node.as_ref() {
            let scope = scopes.get(&pid(path)).expect("every path has an active scope recorded");
            let binding = scope.lookup(name).ok_or_else(|| path.raise_unresolved_identifier(name.clone()))?;
            references.insert(pid(path), binding);
            return Ok(());
        }
    }

    match path.node.as_ref() {
        Node::FunctionDeclaration { .. } => {
            // params/rest are declaration targets, not references.
            if let Some(annotation) = path.get("annotation", None) {
                resolve_references(&annotation, references, scopes, false)?;
            }
            let body = path.get("body", None).unwrap();
            for stmt in body.children() {
                resolve_references(&stmt, references, scopes, false)?;
            }
            Ok(())
        }
        Node::Declarator { .. } => {
            // pattern is a declaration target; only init is a reference site.
            if let Some(init) = path.get("init", None) {
                resolve_references(&init, references, scopes, true)?;
            }
            Ok(())
        }
        Node::MemberExpression { computed, .. } => {
            let object = path.get("object", None).unwrap();
            resolve_references(&object, references, scopes, true)?;
            let property = path.get("property", None).unwrap();
            resolve_references(&property, references, scopes, *computed)?;
            Ok(())
        }
        Node::ImportDeclaration { .. } | Node::ForIn { .. } => {
            // ForIn's `left` is a declaration target; `right`/`body` are not.
            if let Node::ForIn { .. } = path.node.as_ref() {
                let right = path.get("right", None).unwrap();
                resolve_references(&right, references, scopes, true)?;
                let body = path.get("body", None).unwrap();
                resolve_references(&body, references, scopes, false)?;
            }
            Ok(())
        }
        Node::ArrayPattern(_)
        | Node::ObjectPattern(_)
        | Node::RestPattern(_)
        | Node::AssignmentPattern { .. }
        | Node::EmptyPattern => Ok(()),
        _ => {
            for child in path.children() {
                resolve_references(&child, references, scopes, true)?;
            }
            Ok(())
        }
    }
}

fn validate_annotations(path: &Rc<Path>) -> Result<(), CompileError> {
    if let Node::Program(_) = path.node.as_ref() {
        for top_level in path.children() {
            if let Node::FunctionDeclaration { .. } = top_level.node.as_ref() {
                validate_function_annotation(&top_level)?;
            }
        }
    }
    Ok(())
}

fn validate_function_annotation(func: &Rc<Path>) -> Result<(), CompileError> {
    let Some(annotation) = func.get("annotation", None) else {
        return Err(func.raise_compilation_error("top-level function must carry exactly one @version annotation"));
    };
    let Node::Annotation { name, literal } = annotation.node.as_ref() else {
        unreachable!("annotation field always holds an Annotation node");
    };
    if name != "version" {
        return Err(annotation.raise_compilation_error(format!("unknown annotation @{name}, expected @version")));
    }
    semver::Version::parse(literal)
        .map(|_| ())
        .map_err(|e| annotation.raise_compilation_error(format!("`{literal}` is not a valid semantic version: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, Node};

    fn function(name: &str, version: &str) -> crate::ast::NodeRef {
        Rc::new(Node::FunctionDeclaration {
            name: name.to_string(),
            annotation: Some(Rc::new(Node::Annotation { name: "version".into(), literal: version.into() })),
            params: vec![],
            rest: None,
            body: Rc::new(Node::Block(vec![Rc::new(Node::Return(None))])),
        })
    }

    #[test]
    fn resolves_a_variable_reference_to_its_declarator() {
        let decl = Rc::new(Node::VariableDeclaration(vec![Rc::new(Node::Declarator {
            pattern: Rc::new(Node::Identifier("x".into())),
            init: Some(Rc::new(Node::Literal(Literal::Int(1)))),
        })]));
        let reference = Rc::new(Node::Return(Some(Rc::new(Node::Identifier("x".into())))));
        let body = Rc::new(Node::Block(vec![decl, reference]));
        let func = Rc::new(Node::FunctionDeclaration {
            name: "f".into(),
            annotation: Some(Rc::new(Node::Annotation { name: "version".into(), literal: "1.0.0".into() })),
            params: vec![],
            rest: None,
            body,
        });
        let program = Rc::new(Node::Program(vec![func]));
        let analysis = analyze(program).expect("analysis should succeed");
        let return_path = analysis.root.get("body", Some(0)).unwrap().get("body", Some(0)).unwrap().get("body", Some(1)).unwrap();
        let id_path = return_path.get("argument", None).unwrap();
        assert!(analysis.binding_at(&id_path).is_some());
    }

    #[test]
    fn unresolved_identifier_is_an_error() {
        let reference = Rc::new(Node::Return(Some(Rc::new(Node::Identifier("missing".into())))));
        let body = Rc::new(Node::Block(vec![reference]));
        let program = Rc::new(Node::Program(vec![function("f", "1.0.0")]));
        // Swap the stub body out so the function actually references `missing`.
        let program = if let Node::Program(items) = program.as_ref() {
            let Node::FunctionDeclaration { name, annotation, params, rest, .. } = items[0].as_ref() else {
                unreachable!()
            };
            Rc::new(Node::Program(vec![Rc::new(Node::FunctionDeclaration {
                name: name.clone(),
                annotation: annotation.clone(),
                params: params.clone(),
                rest: rest.clone(),
                body,
            })]))
        } else {
            unreachable!()
        };
        assert!(analyze(program).is_err());
    }

    #[test]
    fn double_binding_in_the_same_scope_is_an_error() {
        let decl = |init| {
            Rc::new(Node::Declarator { pattern: Rc::new(Node::Identifier("x".into())), init: Some(init) })
        };
        let body = Rc::new(Node::Block(vec![Rc::new(Node::VariableDeclaration(vec![
            decl(Rc::new(Node::Literal(Literal::Int(1)))),
            decl(Rc::new(Node::Literal(Literal::Int(2)))),
        ]))]));
        let func = function("f", "1.0.0");
        let func = if let Node::FunctionDeclaration { name, annotation, params, rest, .. } = func.as_ref() {
            Rc::new(Node::FunctionDeclaration {
                name: name.clone(),
                annotation: annotation.clone(),
                params: params.clone(),
                rest: rest.clone(),
                body,
            })
        } else {
            unreachable!()
        };
        let program = Rc::new(Node::Program(vec![func]));
        assert!(analyze(program).is_err());
    }

    #[test]
    fn missing_version_annotation_is_an_error() {
        let func = Rc::new(Node::FunctionDeclaration {
            name: "f".into(),
            annotation: None,
            params: vec![],
            rest: None,
            body: Rc::new(Node::Block(vec![])),
        });
        let program = Rc::new(Node::Program(vec![func]));
        assert!(analyze(program).is_err());
    }
}
