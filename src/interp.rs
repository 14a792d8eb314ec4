//! Reference interpreter.
//!
//! Evaluates a decoded program under the same semantics the JIT compiles,
//! with every runtime check the generated code omits: stack depth, operand
//! reach, jump targets, input availability, and a step budget. The
//! test-suite uses it as the oracle for the compiled code, and the demo
//! binary exposes it behind `--interpret`.

use crate::bytecode::{Op, Program};

/// A step budget large enough for any sane program, small enough that a
/// runaway loop fails a test instead of wedging it.
const MAX_STEPS: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpError {
    StackUnderflow { offset: usize },
    OperandOutOfRange { offset: usize, operand: i32 },
    InputExhausted { offset: usize },
    BadJump { offset: usize, target: i64 },
    OutOfFuel,
}

impl std::fmt::Display for InterpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            InterpError::StackUnderflow { offset } => {
                write!(f, "stack underflow at offset {}", offset)
            }
            InterpError::OperandOutOfRange { offset, operand } => {
                write!(f, "stack offset {} out of range at offset {}", operand, offset)
            }
            InterpError::InputExhausted { offset } => {
                write!(f, "input exhausted at offset {}", offset)
            }
            InterpError::BadJump { offset, target } => {
                write!(f, "jump from offset {} to invalid target {}", offset, target)
            }
            InterpError::OutOfFuel => write!(f, "step budget exhausted"),
        }
    }
}

impl std::error::Error for InterpError {}

/// Run `program` against `inputs`, collecting everything `PRINT` emits.
pub fn run(program: &Program, inputs: &[i32]) -> Result<Vec<i32>, InterpError> {
    let insts = program.instructions();
    let mut stack: Vec<i32> = Vec::new();
    let mut next_input = 0usize;
    let mut output = Vec::new();
    let mut index = 0usize;
    let mut steps = 0u64;

    loop {
        if steps == MAX_STEPS {
            return Err(InterpError::OutOfFuel);
        }
        steps += 1;

        // Falling past the last instruction is unreachable for verified
        // programs; for raw ones it is a bad jump to the end.
        let inst = match insts.get(index) {
            Some(inst) => *inst,
            None => {
                return Err(InterpError::BadJump {
                    offset: insts.last().map_or(0, |i| i.offset),
                    target: program.len() as i64,
                })
            }
        };
        let offset = inst.offset;

        let pop = |stack: &mut Vec<i32>| {
            stack.pop().ok_or(InterpError::StackUnderflow { offset })
        };

        match inst.op {
            Op::Constant(value) => stack.push(value),
            Op::Add => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(a.wrapping_add(b));
            }
            Op::Print => {
                let a = pop(&mut stack)?;
                output.push(a);
            }
            Op::Input => {
                let value = *inputs
                    .get(next_input)
                    .ok_or(InterpError::InputExhausted { offset })?;
                next_input += 1;
                stack.push(value);
            }
            Op::Discard => {
                pop(&mut stack)?;
            }
            Op::Get(n) => {
                let slot = slot_index(&stack, n, offset)?;
                stack.push(stack[slot]);
            }
            Op::Set(n) => {
                let a = pop(&mut stack)?;
                let slot = slot_index(&stack, n, offset)?;
                stack[slot] = a;
            }
            Op::Cmp => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(match a.cmp(&b) {
                    std::cmp::Ordering::Greater => 1,
                    std::cmp::Ordering::Less => -1,
                    std::cmp::Ordering::Equal => 0,
                });
            }
            Op::Jgt(delta) => {
                let a = pop(&mut stack)?;
                if a > 0 {
                    let target = offset as i64 + delta as i64;
                    if target < 0 {
                        return Err(InterpError::BadJump { offset, target });
                    }
                    index = program
                        .index_of(target as usize)
                        .ok_or(InterpError::BadJump { offset, target })?;
                    continue;
                }
            }
            Op::Halt => return Ok(output),
        }

        index += 1;
    }
}

/// Index of the slot `n` below the current top.
fn slot_index(stack: &[i32], n: i32, offset: usize) -> Result<usize, InterpError> {
    if n < 0 {
        return Err(InterpError::OperandOutOfRange { offset, operand: n });
    }
    stack
        .len()
        .checked_sub(n as usize + 1)
        .ok_or(InterpError::OperandOutOfRange { offset, operand: n })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::builder::ProgramBuilder;

    fn eval(build: impl FnOnce(&mut ProgramBuilder), inputs: &[i32]) -> Result<Vec<i32>, InterpError> {
        let mut b = ProgramBuilder::new();
        build(&mut b);
        let bytes = b.finish();
        run(&Program::parse(&bytes).unwrap(), inputs)
    }

    #[test]
    fn arithmetic_and_print() {
        let out = eval(
            |b| {
                b.constant(20);
                b.constant(22);
                b.add();
                b.print();
                b.halt();
            },
            &[],
        )
        .unwrap();
        assert_eq!(out, vec![42]);
    }

    #[test]
    fn add_wraps_at_32_bits() {
        let out = eval(
            |b| {
                b.constant(i32::MAX);
                b.constant(1);
                b.add();
                b.print();
                b.halt();
            },
            &[],
        )
        .unwrap();
        assert_eq!(out, vec![i32::MIN]);
    }

    #[test]
    fn cmp_at_the_extremes() {
        for (a, b, expected) in [
            (i32::MIN, i32::MAX, -1),
            (i32::MAX, i32::MIN, 1),
            (i32::MIN, i32::MIN, 0),
            (-1, 0, -1),
            (7, 7, 0),
        ] {
            let out = eval(
                |p| {
                    p.constant(a);
                    p.constant(b);
                    p.cmp();
                    p.print();
                    p.halt();
                },
                &[],
            )
            .unwrap();
            assert_eq!(out, vec![expected], "cmp({}, {})", a, b);
        }
    }

    #[test]
    fn get_and_set_address_exact_slots() {
        // [10, 20, 30] -> get 2 pushes 10; set 2 rewrites the bottom slot.
        let out = eval(
            |b| {
                b.constant(10);
                b.constant(20);
                b.constant(30);
                b.get(2);
                b.constant(99);
                b.add();
                b.set(2);
                b.print(); // 30
                b.print(); // 20
                b.print(); // 109
                b.halt();
            },
            &[],
        )
        .unwrap();
        assert_eq!(out, vec![30, 20, 109]);
    }

    #[test]
    fn input_consumes_in_order() {
        let out = eval(
            |b| {
                b.input();
                b.input();
                b.print(); // second value
                b.print(); // first value
                b.halt();
            },
            &[5, 9],
        )
        .unwrap();
        assert_eq!(out, vec![9, 5]);
    }

    #[test]
    fn input_exhaustion_is_reported() {
        let err = eval(
            |b| {
                b.input();
                b.print();
                b.halt();
            },
            &[],
        )
        .unwrap_err();
        assert_eq!(err, InterpError::InputExhausted { offset: 0 });
    }

    #[test]
    fn underflow_is_reported() {
        let err = eval(
            |b| {
                b.discard();
                b.halt();
            },
            &[],
        )
        .unwrap_err();
        assert_eq!(err, InterpError::StackUnderflow { offset: 0 });
    }

    #[test]
    fn jgt_takes_only_positive() {
        for (flag, expected) in [(1, vec![1]), (0, vec![0, 0]), (-5, vec![-5, -5])] {
            let out = eval(
                |b| {
                    b.input();
                    b.input();
                    let skip = b.jgt_forward();
                    b.get(0);
                    b.print();
                    b.patch(skip, b.offset());
                    b.print();
                    b.halt();
                },
                &[flag, flag],
            )
            .unwrap();
            assert_eq!(out, expected, "flag {}", flag);
        }
    }
}
