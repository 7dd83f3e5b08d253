//! Lowering: AST + `Analysis` to `IlModule` (spec §4.4 "Lowering rules").
//!
//! The bullet list in §4.4 covers literals, operators, calls, identifier
//! references, declarators, assignment, if/if-else, block scoping, and the
//! function prologue explicitly. Two kinds of node the front end otherwise
//! accepts fall outside that list and are rejected here with
//! `LowerError::Unsupported` rather than guessed at: destructuring patterns
//! beyond a bare Identifier (or a RestPattern wrapping one), and
//! MemberExpression reads — neither has a defined lowering, and no opcode
//! in the closed set reads into a LIST/MAP by index or key. `While`/`For`
//! are a direct generalization of the specified `if`/`else` TEST/GOTO
//! idiom to a back-edge (see DESIGN.md); `ForIn` additionally requires
//! iterating a collection's elements, which has no opcode or native
//! backing it, so it stays unsupported like MemberExpression.

use std::rc::Rc;

use wfasm_ast::{Analysis, BinOp, Literal, Node, Path, TemplatePart, UnOp};
use wfasm_value::bytecode::{BinaryOp, Opcode, UnaryOp};
use wfasm_value::Value;

use crate::error::LowerError;
use crate::il::{Il, IlFunction, IlModule};

pub fn lower_module(analysis: &Analysis) -> Result<IlModule, LowerError> {
    let mut functions = Vec::new();
    for top_level in analysis.root.children() {
        if matches!(top_level.node.as_ref(), Node::FunctionDeclaration { .. }) {
            functions.push(lower_function(&top_level, analysis)?);
        }
    }
    Ok(IlModule { functions })
}

fn lower_function(path: &Rc<Path>, analysis: &Analysis) -> Result<IlFunction, LowerError> {
    let Node::FunctionDeclaration { name, params, rest, .. } = path.node.as_ref() else {
        unreachable!("lower_function called on a non-FunctionDeclaration path")
    };

    let mut body_il = vec![Il::NormalizeArgs { params: params.len(), rest: rest.is_some() }];

    // NormalizeArgs leaves [p0..p_{n-1}, rest?] with the last-bound pattern
    // on top; bind from the top down so each compile_pattern call only ever
    // consumes the value currently sitting there.
    if let Some(rest_pat) = path.get("rest", None) {
        compile_pattern(&rest_pat, analysis, &mut body_il)?;
    }
    for param_path in path.map("params", |p| p.clone()).into_iter().rev() {
        compile_pattern(&param_path, analysis, &mut body_il)?;
    }

    let body = path.get("body", None).expect("FunctionDeclaration has a body");
    let mut loops = Vec::new();
    for stmt in body.children() {
        lower_stmt(&stmt, analysis, &mut body_il, &mut loops)?;
    }

    Ok(IlFunction { name: name.clone(), body: body_il })
}

/// A declaration-target pattern: `x` (or `...x`) binds the value currently
/// on top of the stack to a name, per the same "compile-pattern machinery"
/// the declarator and function-prologue rules both call out.
fn compile_pattern(path: &Rc<Path>, analysis: &Analysis, out: &mut Vec<Il>) -> Result<(), LowerError> {
    match path.node.as_ref() {
        Node::Identifier(name) => {
            let scope = analysis.scope_at(path).ok_or(LowerError::MissingBinding)?;
            let compiled = scope.compiled_name(name);
            out.push(Il::PushLiteral(Value::string(compiled)));
            out.push(Il::SetVar);
            Ok(())
        }
        Node::RestPattern(_) => {
            let inner = path.get("argument", None).expect("RestPattern has an argument");
            compile_pattern(&inner, analysis, out)
        }
        other => Err(LowerError::Unsupported {
            node_kind: other.kind(),
            detail: "only a bare Identifier or RestPattern(Identifier) may be a declaration target".into(),
        }),
    }
}

/// An assignment target: `x = e`'s `x`, a *reference* to an existing
/// binding rather than a declaration, resolved through `Analysis` rather
/// than recomputed from scope.
fn compile_assignment_target(path: &Rc<Path>, analysis: &Analysis, out: &mut Vec<Il>) -> Result<(), LowerError> {
    match path.node.as_ref() {
        Node::Identifier(_) => {
            let binding = analysis.binding_at(path).ok_or(LowerError::MissingBinding)?;
            out.push(Il::PushLiteral(Value::string(binding.compiled_name.clone())));
            out.push(Il::SetVar);
            Ok(())
        }
        other => Err(LowerError::Unsupported {
            node_kind: other.kind(),
            detail: "assignment targets must be a plain Identifier (no destructuring assignment)".into(),
        }),
    }
}

fn lower_identifier_reference(path: &Rc<Path>, analysis: &Analysis, out: &mut Vec<Il>) -> Result<(), LowerError> {
    use wfasm_ast::BindingKind;
    let binding = analysis.binding_at(path).ok_or(LowerError::MissingBinding)?;
    match binding.kind {
        BindingKind::Variable => {
            out.push(Il::PushLiteral(Value::string(binding.compiled_name.clone())));
            out.push(Il::GetVar);
        }
        BindingKind::ModuleFunction => {
            out.push(Il::PushFn { package: None, name: binding.compiled_name.clone() })
        }
        BindingKind::ImportedFunction => {
            out.push(Il::PushFn { package: binding.package.clone(), name: binding.compiled_name.clone() })
        }
    }
    Ok(())
}

fn binop_arg(op: BinOp) -> (BinaryOp, bool) {
    match op {
        BinOp::Add => (BinaryOp::Add, false),
        BinOp::Sub => (BinaryOp::Sub, false),
        BinOp::Mul => (BinaryOp::Mul, false),
        BinOp::Div => (BinaryOp::Div, false),
        BinOp::Mod => (BinaryOp::Mod, false),
        BinOp::Pow => (BinaryOp::Pow, false),
        BinOp::And => (BinaryOp::And, false),
        BinOp::Or => (BinaryOp::Or, false),
        BinOp::Eq => (BinaryOp::Eq, false),
        BinOp::Lt => (BinaryOp::Lt, false),
        BinOp::Le => (BinaryOp::Le, false),
        // GT, GE, NE are derived by the compiler as negations of LE, LT, EQ.
        BinOp::Gt => (BinaryOp::Le, true),
        BinOp::Ge => (BinaryOp::Lt, true),
        BinOp::Ne => (BinaryOp::Eq, true),
    }
}

fn lower_template(
    path: &Rc<Path>,
    parts: &[TemplatePart],
    analysis: &Analysis,
    out: &mut Vec<Il>,
) -> Result<(), LowerError> {
    // Concatenation at codegen time (ast.rs): fold the parts left to right
    // with STRING ADD, each embedded expression coerced by the front end
    // to already be a STRING (the back end does not insert its own casts).
    let mut expr_index = 0usize;
    let mut first = true;
    for part in parts {
        match part {
            TemplatePart::Str(s) => out.push(Il::PushLiteral(Value::string(s.clone()))),
            TemplatePart::Expr(_) => {
                let child = path
                    .map("parts", |p| p.clone())
                    .into_iter()
                    .nth(expr_index)
                    .expect("template part count matches its Expr children");
                expr_index += 1;
                lower_expr(&child, analysis, out)?;
            }
        }
        if !first {
            out.push(Il::Asm(Opcode::Binop, BinaryOp::Add.to_arg()));
        }
        first = false;
    }
    if parts.is_empty() {
        out.push(Il::PushLiteral(Value::string("")));
    }
    Ok(())
}

fn lower_expr(path: &Rc<Path>, analysis: &Analysis, out: &mut Vec<Il>) -> Result<(), LowerError> {
    match path.node.as_ref() {
        Node::Literal(Literal::Template(parts)) => lower_template(path, parts, analysis, out),
        Node::Literal(lit) => {
            let value = lit.as_value().expect("non-Template literals always have a tagged value");
            out.push(Il::PushLiteral(value));
            Ok(())
        }
        Node::Identifier(_) => lower_identifier_reference(path, analysis, out),
        Node::BinaryExpression { op, .. } => {
            let left = path.get("left", None).expect("BinaryExpression has a left operand");
            let right = path.get("right", None).expect("BinaryExpression has a right operand");
            lower_expr(&left, analysis, out)?;
            lower_expr(&right, analysis, out)?;
            let (runtime_op, negate) = binop_arg(*op);
            out.push(Il::Asm(Opcode::Binop, runtime_op.to_arg()));
            if negate {
                out.push(Il::Asm(Opcode::Unop, UnaryOp::Not.to_arg()));
            }
            Ok(())
        }
        Node::UnaryExpression { op, .. } => {
            let argument = path.get("argument", None).expect("UnaryExpression has an argument");
            lower_expr(&argument, analysis, out)?;
            let runtime_op = match op {
                UnOp::Neg => UnaryOp::Minus,
                UnOp::Not => UnaryOp::Not,
            };
            out.push(Il::Asm(Opcode::Unop, runtime_op.to_arg()));
            Ok(())
        }
        Node::CallExpression { .. } => {
            let callee = path.get("callee", None).expect("CallExpression has a callee");
            let arguments = path.map("arguments", |p| p.clone());
            for arg in &arguments {
                lower_expr(arg, analysis, out)?;
            }
            out.push(Il::Asm(Opcode::PushInt, arguments.len() as i32));
            lower_expr(&callee, analysis, out)?;
            out.push(Il::Asm(Opcode::Call, 0));
            Ok(())
        }
        Node::AssignmentExpression { .. } => {
            let value = path.get("value", None).expect("AssignmentExpression has a value");
            lower_expr(&value, analysis, out)?;
            out.push(Il::Asm(Opcode::Dup, 0));
            let target = path.get("target", None).expect("AssignmentExpression has a target");
            compile_assignment_target(&target, analysis, out)
        }
        other => Err(LowerError::Unsupported {
            node_kind: other.kind(),
            detail: "not one of the expression kinds the back end's lowering rules define".into(),
        }),
    }
}

/// Labels a nesting loop's break/continue targets, pushed while lowering
/// its body and popped once lowered.
struct LoopCtx {
    break_label: String,
    continue_label: String,
}

fn lower_stmt(
    path: &Rc<Path>,
    analysis: &Analysis,
    out: &mut Vec<Il>,
    loops: &mut Vec<LoopCtx>,
) -> Result<(), LowerError> {
    match path.node.as_ref() {
        Node::VariableDeclaration(_) => {
            for decl in path.children() {
                let pattern = decl.get("pattern", None).expect("Declarator has a pattern");
                match decl.get("init", None) {
                    Some(init) => lower_expr(&init, analysis, out)?,
                    None => out.push(Il::PushLiteral(Value::Null)),
                }
                compile_pattern(&pattern, analysis, out)?;
            }
            Ok(())
        }
        Node::Block(_) => {
            let scope = analysis.scope_at(path).ok_or(LowerError::MissingBinding)?;
            out.push(Il::OpenScope(format!("{}/block", scope.prefix)));
            for stmt in path.children() {
                lower_stmt(&stmt, analysis, out, loops)?;
            }
            out.push(Il::CloseScope(format!("{}/block", scope.prefix)));
            Ok(())
        }
        Node::If { .. } => {
            let scope = analysis.scope_at(path).ok_or(LowerError::MissingBinding)?;
            let test = path.get("test", None).expect("If has a test");
            let consequent = path.get("consequent", None).expect("If has a consequent");
            lower_expr(&test, analysis, out)?;
            out.push(Il::Asm(Opcode::Test, 1));
            match path.get("alternate", None) {
                None => {
                    let exit = scope.next_label();
                    out.push(Il::Goto(exit.clone()));
                    lower_stmt(&consequent, analysis, out, loops)?;
                    out.push(Il::Label(exit));
                }
                Some(alternate) => {
                    let alt = scope.next_label();
                    let exit = scope.next_label();
                    out.push(Il::Goto(alt.clone()));
                    lower_stmt(&consequent, analysis, out, loops)?;
                    out.push(Il::Goto(exit.clone()));
                    out.push(Il::Label(alt));
                    lower_stmt(&alternate, analysis, out, loops)?;
                    out.push(Il::Label(exit));
                }
            }
            Ok(())
        }
        Node::While { .. } => {
            let scope = analysis.scope_at(path).ok_or(LowerError::MissingBinding)?;
            let start = scope.next_label();
            let end = scope.next_label();
            let test = path.get("test", None).expect("While has a test");
            let body = path.get("body", None).expect("While has a body");
            out.push(Il::Label(start.clone()));
            lower_expr(&test, analysis, out)?;
            out.push(Il::Asm(Opcode::Test, 1));
            out.push(Il::Goto(end.clone()));
            loops.push(LoopCtx { break_label: end.clone(), continue_label: start.clone() });
            let result = lower_stmt(&body, analysis, out, loops);
            loops.pop();
            result?;
            out.push(Il::Goto(start));
            out.push(Il::Label(end));
            Ok(())
        }
        Node::For { .. } => {
            let scope = analysis.scope_at(path).ok_or(LowerError::MissingBinding)?;
            let test_start = scope.next_label();
            let continue_label = scope.next_label();
            let end = scope.next_label();
            if let Some(init) = path.get("init", None) {
                lower_stmt(&init, analysis, out, loops)?;
            }
            out.push(Il::Label(test_start.clone()));
            if let Some(test) = path.get("test", None) {
                lower_expr(&test, analysis, out)?;
                out.push(Il::Asm(Opcode::Test, 1));
                out.push(Il::Goto(end.clone()));
            }
            let body = path.get("body", None).expect("For has a body");
            loops.push(LoopCtx { break_label: end.clone(), continue_label: continue_label.clone() });
            let result = lower_stmt(&body, analysis, out, loops);
            loops.pop();
            result?;
            out.push(Il::Label(continue_label));
            if let Some(update) = path.get("update", None) {
                lower_expr(&update, analysis, out)?;
                out.push(Il::Asm(Opcode::Pop, 1));
            }
            out.push(Il::Goto(test_start));
            out.push(Il::Label(end));
            Ok(())
        }
        Node::Return(argument) => {
            match argument {
                Some(_) => {
                    let argument = path.get("argument", None).expect("checked Some above");
                    lower_expr(&argument, analysis, out)?;
                }
                None => out.push(Il::PushLiteral(Value::Null)),
            }
            out.push(Il::Asm(Opcode::Return, 0));
            Ok(())
        }
        Node::Throw(_) => {
            let argument = path.get("argument", None).expect("Throw has an argument");
            lower_expr(&argument, analysis, out)?;
            out.push(Il::Asm(Opcode::Throw, 0));
            Ok(())
        }
        Node::Break => match loops.last() {
            Some(ctx) => {
                out.push(Il::Goto(ctx.break_label.clone()));
                Ok(())
            }
            None => Err(LowerError::Unsupported { node_kind: "Break", detail: "not inside a loop".into() }),
        },
        Node::Continue => match loops.last() {
            Some(ctx) => {
                out.push(Il::Goto(ctx.continue_label.clone()));
                Ok(())
            }
            None => Err(LowerError::Unsupported { node_kind: "Continue", detail: "not inside a loop".into() }),
        },
        Node::ForIn { .. } => Err(LowerError::Unsupported {
            node_kind: "ForIn",
            detail: "iterating a LIST/MAP's elements has no supporting opcode or native".into(),
        }),
        Node::ImportDeclaration { .. } => Ok(()),
        // Any other node kind reached at statement position is an
        // expression evaluated for its side effect; its value is discarded.
        _ => {
            lower_expr(path, analysis, out)?;
            out.push(Il::Asm(Opcode::Pop, 1));
            Ok(())
        }
    }
}
