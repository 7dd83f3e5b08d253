//! Seed scenarios and universal invariants (spec §8), exercised against
//! literal bytecode through `StaticConfig`.

use wfasm_value::bytecode::{Instruction, Opcode};
use wfasm_value::{Callable, Value};
use wfasm_vm::{run_to_halt, running_status, step, FrameType, RunningStatus, State, StateSnapshot, StaticConfig};

fn instr(op: Opcode, arg: i32) -> Instruction {
    Instruction::new(op, arg)
}

/// Scenario 1: empty main faults with a literal OUT_OF_RANGE message.
#[test]
fn seed_empty_main() {
    let config = StaticConfig::new().with_function("main", vec![], vec![]);
    let mut state = State::new(config);
    step(&mut state).unwrap();
    assert_eq!(running_status(&state), RunningStatus::Halt);
    let err = state.main_frame().return_error().expect("main terminated with an error");
    match err {
        Value::Message(m) => match m.as_ref() {
            wfasm_value::MessageRecord::Status { code, message } => {
                assert_eq!(*code, wfasm_value::StatusCode::OutOfRange);
                assert_eq!(message, "instruction pointer out of range");
            }
            other => panic!("expected a Status record, got {other:?}"),
        },
        other => panic!("expected a MESSAGE-tagged error, got {other:?}"),
    }
}

/// Scenario 2: main returns an integer directly.
#[test]
fn seed_main_returns_integer() {
    let config = StaticConfig::new().with_function(
        "main",
        vec![instr(Opcode::PushInt, 31337), instr(Opcode::Return, 0)],
        vec![],
    );
    let mut state = State::new(config);
    run_to_halt(&mut state).unwrap();
    assert_eq!(state.main_frame().return_value(), Some(&Value::Int64(31337)));
    assert!(state.main_frame().return_error().is_none());
}

/// Scenario 3: main throws NULL.
#[test]
fn seed_main_throws_null() {
    let config = StaticConfig::new().with_function(
        "main",
        vec![instr(Opcode::PushNull, 0), instr(Opcode::Throw, 0)],
        vec![],
    );
    let mut state = State::new(config);
    run_to_halt(&mut state).unwrap();
    assert_eq!(state.main_frame().return_error(), Some(&Value::Null));
    assert!(state.main_frame().return_value().is_none());
}

/// Scenario 4: nested call returns through two frames.
#[test]
fn seed_nested_call_returns_through_two_frames() {
    let config = StaticConfig::new()
        .with_function(
            "main",
            vec![
                instr(Opcode::PushInt, 0),
                instr(Opcode::PushK, 0),
                instr(Opcode::Call, 0),
                instr(Opcode::Return, 0),
            ],
            vec![Value::Callable(Callable::function("f1"))],
        )
        .with_function("f1", vec![instr(Opcode::PushInt, 31337), instr(Opcode::Return, 0)], vec![]);
    let mut state = State::new(config);
    run_to_halt(&mut state).unwrap();
    assert_eq!(state.main_frame().return_value(), Some(&Value::Int64(31337)));
}

/// Scenario 5: call-throw propagation through two frames.
#[test]
fn seed_call_throw_propagates_through_two_frames() {
    let config = StaticConfig::new()
        .with_function(
            "main",
            vec![
                instr(Opcode::PushInt, 0),
                instr(Opcode::PushK, 0),
                instr(Opcode::Call, 0),
                instr(Opcode::Return, 0),
            ],
            vec![Value::Callable(Callable::function("f1"))],
        )
        .with_function(
            "f1",
            vec![
                instr(Opcode::PushInt, 0),
                instr(Opcode::PushK, 0),
                instr(Opcode::Call, 0),
                instr(Opcode::Return, 0),
            ],
            vec![Value::Callable(Callable::function("f2"))],
        )
        .with_function("f2", vec![instr(Opcode::PushNull, 0), instr(Opcode::Throw, 0)], vec![]);
    let mut state = State::new(config);
    run_to_halt(&mut state).unwrap();
    assert_eq!(state.main_frame().return_error(), Some(&Value::Null));
    assert!(state.main_frame().return_value().is_none());
}

/// Scenario 6: if-then dispatch via TEST/JMP, both the truthy and falsy
/// paths.
#[test]
fn seed_if_then_dispatch() {
    fn build(head: Instruction) -> StaticConfig {
        StaticConfig::new()
            .with_function(
                "main",
                vec![
                    head,
                    instr(Opcode::Test, 1),
                    instr(Opcode::Jmp, 7),
                    instr(Opcode::PushInt, 0),
                    instr(Opcode::PushK, 0),
                    instr(Opcode::Call, 0),
                    instr(Opcode::Return, 0),
                    instr(Opcode::PushInt, 0),
                    instr(Opcode::PushK, 1),
                    instr(Opcode::Call, 0),
                    instr(Opcode::Return, 0),
                ],
                vec![
                    Value::Callable(Callable::function("truthy_fn")),
                    Value::Callable(Callable::function("falsy_fn")),
                ],
            )
            .with_function("truthy_fn", vec![instr(Opcode::PushInt, 1), instr(Opcode::Return, 0)], vec![])
            .with_function("falsy_fn", vec![instr(Opcode::PushInt, 0), instr(Opcode::Return, 0)], vec![])
    }

    let mut truthy_state = State::new(build(instr(Opcode::PushInt, 1)));
    run_to_halt(&mut truthy_state).unwrap();
    assert_eq!(truthy_state.main_frame().return_value(), Some(&Value::Int64(1)));

    let mut falsy_state = State::new(build(instr(Opcode::PushNull, 0)));
    run_to_halt(&mut falsy_state).unwrap();
    assert_eq!(falsy_state.main_frame().return_value(), Some(&Value::Int64(0)));
}

/// Universal invariant: after every step, the call stack still contains a
/// MAIN frame and the cached control frame is the topmost control frame.
#[test]
fn invariant_control_frame_stays_consistent() {
    let config = StaticConfig::new()
        .with_function(
            "main",
            vec![
                instr(Opcode::PushInt, 0),
                instr(Opcode::PushK, 0),
                instr(Opcode::Call, 0),
                instr(Opcode::Return, 0),
            ],
            vec![Value::Callable(Callable::function("f1"))],
        )
        .with_function("f1", vec![instr(Opcode::PushInt, 1), instr(Opcode::Return, 0)], vec![]);
    let mut state = State::new(config);
    while running_status(&state) == RunningStatus::Run {
        step(&mut state).unwrap();
        assert!(state.control_frame_is_consistent());
        assert_eq!(state.main_frame().frame_type, FrameType::Main);
    }
}

/// Idempotence: stepping a HALTed state is a fatal, not a silent mutation.
#[test]
fn stepping_a_halted_state_is_fatal() {
    let config = StaticConfig::new().with_function("main", vec![instr(Opcode::Return, 0)], vec![]);
    // main has no value to return: RETURN on an empty stack faults OUT_OF_RANGE.
    let mut state = State::new(config);
    run_to_halt(&mut state).unwrap();
    assert_eq!(running_status(&state), RunningStatus::Halt);
    let err = step(&mut state).unwrap_err();
    assert_eq!(err, wfasm_vm::VmFault::SteppedHaltedState);
}

/// A run suspended mid-call stack, serialized to JSON, and resumed from that
/// JSON against a fresh `StaticConfig` produces the same outcome as running
/// straight through: this is the suspend/checkpoint/resume contract the
/// whole state model exists for.
#[test]
fn suspending_mid_call_and_resuming_from_json_matches_running_straight_through() {
    fn config() -> StaticConfig {
        StaticConfig::new()
            .with_function(
                "main",
                vec![
                    instr(Opcode::PushInt, 0),
                    instr(Opcode::PushK, 0),
                    instr(Opcode::Call, 0),
                    instr(Opcode::Return, 0),
                ],
                vec![Value::Callable(Callable::function("f1"))],
            )
            .with_function("f1", vec![instr(Opcode::PushInt, 31337), instr(Opcode::Return, 0)], vec![])
    }

    let mut reference = State::new(config());
    run_to_halt(&mut reference).unwrap();

    let mut suspended = State::new(config());
    step(&mut suspended).unwrap();
    assert_eq!(suspended.call_depth(), 1, "main hasn't called f1 yet");

    let json = serde_json::to_string(&suspended.snapshot()).expect("snapshot serializes");
    let snapshot: StateSnapshot = serde_json::from_str(&json).expect("snapshot deserializes");
    let mut resumed = State::restore(snapshot, config());
    run_to_halt(&mut resumed).unwrap();

    assert_eq!(resumed.main_frame().return_value(), reference.main_frame().return_value());
    assert_eq!(resumed.main_frame().return_value(), Some(&Value::Int64(31337)));
}

/// BINOP dispatch reaches the same arithmetic the unit tests exercise
/// directly (true 2^64 wrap-around is covered at the `ops` unit level,
/// since `PUSHINT`'s operand is a 32-bit immediate).
#[test]
fn binop_add_reaches_through_dispatch() {
    let config = StaticConfig::new().with_function(
        "main",
        vec![
            instr(Opcode::PushInt, i32::MAX),
            instr(Opcode::PushInt, 1),
            instr(Opcode::Binop, wfasm_value::bytecode::BinaryOp::Add.to_arg()),
            instr(Opcode::Return, 0),
        ],
        vec![],
    );
    let mut state = State::new(config);
    run_to_halt(&mut state).unwrap();
    assert_eq!(
        state.main_frame().return_value(),
        Some(&Value::Int64(i32::MAX as i64 + 1))
    );
}
