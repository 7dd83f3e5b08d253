//! The two-pass assembler: `IlModule` to `ObjectFile`. First pass counts the
//! bytecode address of every instruction and records each label's address;
//! second pass encodes every `Il` op against the completed label map,
//! folding literals and function references into a per-function constant
//! table via linear-scan dedup (`Value` has no `Hash` impl, since MAP/LIST
//! are interior-mutable handles, so a `HashMap<Value, usize>` ktable isn't
//! available the way it would be for a hashable key).

use wfasm_value::bytecode::{Function, Instruction, ObjectFile, Opcode};
use wfasm_value::{Callable, Value, REST_COLLECTOR_NATIVE_ID};

use crate::error::AssembleError;
use crate::il::{Il, IlFunction, IlModule};

pub fn assemble(module: &IlModule, package: &str) -> Result<ObjectFile, AssembleError> {
    let mut object = ObjectFile::new(package);
    for f in &module.functions {
        let compiled = assemble_function(f)?;
        object.functions.insert(f.name.clone(), compiled);
    }
    Ok(object)
}

fn callable_id(package: &Option<String>, name: &str) -> String {
    match package {
        Some(pkg) => format!("{pkg}::{name}"),
        None => name.to_string(),
    }
}

fn assemble_function(f: &IlFunction) -> Result<Function, AssembleError> {
    let expanded = expand_normalize_args(&f.body);

    let mut labels = std::collections::HashMap::new();
    let mut pc = 0usize;
    for il in &expanded {
        match il {
            Il::Label(name) => {
                if labels.insert(name.clone(), pc).is_some() {
                    return Err(AssembleError::DuplicateLabel(name.clone()));
                }
            }
            Il::OpenScope(_) | Il::CloseScope(_) => {}
            _ => pc += 1,
        }
    }

    let mut constants = Vec::new();
    let mut instructions = Vec::with_capacity(pc);
    for il in &expanded {
        match il {
            Il::Noop => instructions.push(Instruction::new(Opcode::Noop, 0)),
            Il::Asm(op, arg) => instructions.push(Instruction::new(*op, *arg)),
            Il::PushLiteral(v) => instructions.push(push_literal(v, &mut constants)),
            Il::PushFn { package, name } => {
                let id = callable_id(package, name);
                instructions.push(intern_instr(Value::Callable(Callable::function(id)), &mut constants));
            }
            Il::SetVar => instructions.push(Instruction::new(Opcode::SetLocal, 0)),
            Il::GetVar => instructions.push(Instruction::new(Opcode::GetLocal, 0)),
            Il::Goto(target) => {
                let pc = *labels.get(target).ok_or_else(|| AssembleError::UndefinedLabel(target.clone()))?;
                instructions.push(Instruction::new(Opcode::Jmp, pc as i32));
            }
            Il::Label(_) | Il::OpenScope(_) | Il::CloseScope(_) => {}
            Il::NormalizeArgs { .. } => unreachable!("expand_normalize_args replaced every NormalizeArgs op"),
        }
    }

    Ok(Function::new(instructions, constants))
}

/// PUSHNULL/PUSHINT cover NULL and any INT64 that fits a 32-bit immediate
/// directly; everything else goes through the constant table.
fn push_literal(v: &Value, constants: &mut Vec<Value>) -> Instruction {
    match v {
        Value::Null => Instruction::new(Opcode::PushNull, 0),
        Value::Int64(n) => match i32::try_from(*n) {
            Ok(small) => Instruction::new(Opcode::PushInt, small),
            Err(_) => intern_instr(v.clone(), constants),
        },
        _ => intern_instr(v.clone(), constants),
    }
}

fn intern_instr(v: Value, constants: &mut Vec<Value>) -> Instruction {
    let k = match constants.iter().position(|c| *c == v) {
        Some(i) => i,
        None => {
            constants.push(v);
            constants.len() - 1
        }
    };
    Instruction::new(Opcode::PushK, k as i32)
}

/// Expands every `NormalizeArgs` op into the closed-opcode-set bytecode
/// sequence that implements it (spec §4.4's prologue, no opcode of its own):
///
/// - a pad loop pushes NULL while the argument depth is below `params`, so a
///   short call still leaves every declared parameter bound to something;
/// - without a rest parameter, a trim loop then pops down to exactly
///   `params` values, using `NOT(LE)` to synthesize `>` (not in the closed
///   BINOP set);
/// - with a rest parameter, the excess (possibly zero) is instead collected
///   by a CALL to the `REST_COLLECTOR_NATIVE_ID` native, whose count is
///   computed at runtime as `PUSHDEPTH - params` — this also correctly
///   yields an empty LIST when there is no excess, so no separate trim path
///   is needed in that branch.
///
/// Labels are namespaced under a `%` prefix, which no script-declared label
/// can collide with (`Scope::next_label` always starts from a scope prefix).
fn expand_normalize_args(body: &[Il]) -> Vec<Il> {
    let mut out = Vec::with_capacity(body.len());
    let mut counter = 0u32;
    for il in body {
        match il {
            Il::NormalizeArgs { params, rest } => {
                expand_one(*params, *rest, counter, &mut out);
                counter += 1;
            }
            other => out.push(other.clone()),
        }
    }
    out
}

fn expand_one(params: usize, rest: bool, id: u32, out: &mut Vec<Il>) {
    let params = params as i32;
    let pad_start = format!("%nrm{id}_pad_start");
    let pad_end = format!("%nrm{id}_pad_end");

    out.push(Il::Label(pad_start.clone()));
    out.push(Il::Asm(wfasm_value::bytecode::Opcode::PushDepth, 0));
    out.push(Il::Asm(wfasm_value::bytecode::Opcode::PushInt, params));
    out.push(Il::Asm(wfasm_value::bytecode::Opcode::Binop, wfasm_value::bytecode::BinaryOp::Lt.to_arg()));
    out.push(Il::Asm(wfasm_value::bytecode::Opcode::Test, 1));
    out.push(Il::Goto(pad_end.clone()));
    out.push(Il::Asm(wfasm_value::bytecode::Opcode::PushNull, 0));
    out.push(Il::Goto(pad_start));
    out.push(Il::Label(pad_end));

    if rest {
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::PushDepth, 0));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::PushInt, params));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::Binop, wfasm_value::bytecode::BinaryOp::Sub.to_arg()));
        out.push(Il::PushLiteral(Value::Callable(Callable::native(REST_COLLECTOR_NATIVE_ID))));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::Call, 0));
    } else {
        let trim_start = format!("%nrm{id}_trim_start");
        let trim_end = format!("%nrm{id}_trim_end");
        out.push(Il::Label(trim_start.clone()));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::PushDepth, 0));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::PushInt, params));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::Binop, wfasm_value::bytecode::BinaryOp::Le.to_arg()));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::Unop, wfasm_value::bytecode::UnaryOp::Not.to_arg()));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::Test, 1));
        out.push(Il::Goto(trim_end.clone()));
        out.push(Il::Asm(wfasm_value::bytecode::Opcode::Pop, 1));
        out.push(Il::Goto(trim_start));
        out.push(Il::Label(trim_end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::IlFunction;

    fn run_fixed_arity(params: i32, argc: i32) -> wfasm_vm::State {
        use wfasm_value::bytecode::Opcode as Op;
        let module = IlModule {
            functions: vec![IlFunction {
                name: "main".into(),
                body: vec![
                    Il::NormalizeArgs { params: params as usize, rest: false },
                    Il::Asm(Op::PushDepth, 0),
                    Il::Asm(Op::Return, 0),
                ],
            }],
        };
        let object = assemble(&module, "test").unwrap();
        let config = wfasm_vm::StaticConfig::new().with_function(
            "main",
            object.functions["main"].instructions.clone(),
            object.functions["main"].constants.clone(),
        );
        let mut state = wfasm_vm::State::new(config);
        let args: Vec<Value> = (0..argc).map(|i| Value::Int64(i as i64)).collect();
        state.main_frame_mut().stack_mut().unwrap().extend(args);
        wfasm_vm::run_to_halt(&mut state).unwrap();
        state
    }

    #[test]
    fn pads_a_short_call_with_null() {
        let state = run_fixed_arity(3, 1);
        assert_eq!(state.main_frame().return_value(), Some(&Value::Int64(3)));
    }

    #[test]
    fn trims_a_long_call() {
        let state = run_fixed_arity(2, 5);
        assert_eq!(state.main_frame().return_value(), Some(&Value::Int64(2)));
    }

    #[test]
    fn undefined_label_is_an_assemble_error() {
        let module = IlModule {
            functions: vec![IlFunction {
                name: "f".into(),
                body: vec![Il::Goto("nowhere".into())],
            }],
        };
        assert!(assemble(&module, "test").is_err());
    }

    #[test]
    fn large_int_literal_goes_through_the_constant_table() {
        let module = IlModule {
            functions: vec![IlFunction {
                name: "f".into(),
                body: vec![Il::PushLiteral(Value::Int64(i64::MAX)), Il::Asm(wfasm_value::bytecode::Opcode::Return, 0)],
            }],
        };
        let object = assemble(&module, "test").unwrap();
        let f = &object.functions["f"];
        assert_eq!(f.instructions[0].opcode, wfasm_value::bytecode::Opcode::PushK);
        assert_eq!(f.constants[0], Value::Int64(i64::MAX));
    }
}
