//! wfasm-codegen — the WorkflowASM script compiler's back end: an
//! intermediate language (`il`), lowering rules from a resolved AST into it
//! (`lower`), and the two-pass assembler that turns IL into an `ObjectFile`
//! (`assemble`), per spec §4.4.
//!
//! [`compile`] is the entry point: front-end analysis (`wfasm_ast::analyze`)
//! feeds straight into lowering and assembly.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod assemble;
pub mod error;
pub mod il;
pub mod lower;

pub use error::{AssembleError, LowerError};
pub use il::{Il, IlFunction, IlModule};

use thiserror::Error;
use wfasm_ast::{CompileError, NodeRef};
use wfasm_value::bytecode::ObjectFile;

#[derive(Debug, Clone, Error)]
pub enum CompilePipelineError {
    #[error(transparent)]
    Analysis(#[from] CompileError),
    #[error(transparent)]
    Lower(#[from] LowerError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// Runs the full front-to-back pipeline on a parsed program: scoping and
/// reference resolution, lowering, and assembly, producing an `ObjectFile`
/// ready for a `wfasm_vm::Config` to serve.
pub fn compile(program: NodeRef, package: &str) -> Result<ObjectFile, CompilePipelineError> {
    let analysis = wfasm_ast::analyze(program)?;
    let module = lower::lower_module(&analysis)?;
    let object = assemble::assemble(&module, package)?;
    Ok(object)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use wfasm_ast::{Literal, Node};
    use wfasm_value::bytecode::Opcode;
    use wfasm_value::Value;

    use super::*;

    fn annotated(name: &str, params: Vec<NodeRef>, rest: Option<NodeRef>, body: Vec<NodeRef>) -> NodeRef {
        Rc::new(Node::FunctionDeclaration {
            name: name.into(),
            annotation: Some(Rc::new(Node::Annotation { name: "version".into(), literal: "1.0.0".into() })),
            params,
            rest,
            body: Rc::new(Node::Block(body)),
        })
    }

    #[test]
    fn compiles_a_function_that_returns_a_literal() {
        let func = annotated(
            "main",
            vec![],
            None,
            vec![Rc::new(Node::Return(Some(Rc::new(Node::Literal(Literal::Int(42))))))],
        );
        let program = Rc::new(Node::Program(vec![func]));
        let object = compile(program, "demo").expect("compiles");
        let f = &object.functions["main"];
        assert!(f.instructions.iter().any(|i| i.opcode == Opcode::Return));
    }

    #[test]
    fn compiles_a_binary_add_and_assignment() {
        let decl = Rc::new(Node::VariableDeclaration(vec![Rc::new(Node::Declarator {
            pattern: Rc::new(Node::Identifier("x".into())),
            init: Some(Rc::new(Node::Literal(Literal::Int(1)))),
        })]));
        let assign = Rc::new(Node::AssignmentExpression {
            target: Rc::new(Node::Identifier("x".into())),
            value: Rc::new(Node::BinaryExpression {
                op: wfasm_ast::BinOp::Add,
                left: Rc::new(Node::Identifier("x".into())),
                right: Rc::new(Node::Literal(Literal::Int(1))),
            }),
        });
        let ret = Rc::new(Node::Return(Some(Rc::new(Node::Identifier("x".into())))));
        let func = annotated("main", vec![], None, vec![decl, assign, ret]);
        let program = Rc::new(Node::Program(vec![func]));
        let object = compile(program, "demo").expect("compiles");
        let f = &object.functions["main"];
        assert!(f.instructions.iter().any(|i| i.opcode == Opcode::SetLocal));
        assert!(f.instructions.iter().any(|i| i.opcode == Opcode::GetLocal));
        assert!(f.instructions.iter().any(|i| i.opcode == Opcode::Binop));
    }

    #[test]
    fn rejects_member_expression_assignment_as_unsupported() {
        let target = Rc::new(Node::MemberExpression {
            object: Rc::new(Node::Identifier("obj".into())),
            property: Rc::new(Node::Identifier("prop".into())),
            computed: false,
        });
        let decl = Rc::new(Node::VariableDeclaration(vec![Rc::new(Node::Declarator {
            pattern: Rc::new(Node::Identifier("obj".into())),
            init: Some(Rc::new(Node::Literal(Literal::Null))),
        })]));
        let assign = Rc::new(Node::AssignmentExpression {
            target,
            value: Rc::new(Node::Literal(Literal::Int(1))),
        });
        let func = annotated("main", vec![], None, vec![decl, assign, Rc::new(Node::Return(None))]);
        let program = Rc::new(Node::Program(vec![func]));
        let err = compile(program, "demo").unwrap_err();
        assert!(matches!(err, CompilePipelineError::Lower(LowerError::Unsupported { .. })));
    }

    #[test]
    fn rest_parameters_compile_with_the_collector_native() {
        let func = annotated(
            "variadic",
            vec![Rc::new(Node::Identifier("first".into()))],
            Some(Rc::new(Node::Identifier("rest".into()))),
            vec![Rc::new(Node::Return(Some(Rc::new(Node::Identifier("rest".into())))))],
        );
        let program = Rc::new(Node::Program(vec![func]));
        let object = compile(program, "demo").expect("compiles");
        let f = &object.functions["variadic"];
        let has_collector = f.constants.iter().any(|c| match c {
            Value::Callable(callable) => callable.id() == wfasm_value::REST_COLLECTOR_NATIVE_ID,
            _ => false,
        });
        assert!(has_collector);
    }

    #[test]
    fn break_outside_a_loop_is_unsupported() {
        let func = annotated("main", vec![], None, vec![Rc::new(Node::Break)]);
        let program = Rc::new(Node::Program(vec![func]));
        assert!(compile(program, "demo").is_err());
    }
}
