//! End-to-end tests: generated code against the checked interpreter, plus
//! the properties the compiler has to hold on its own (jump directions,
//! signed comparison at the i32 extremes, slot addressing, independence of
//! repeated compilations).

use stackjit::bytecode::builder::ProgramBuilder;
use stackjit::bytecode::Program;
use stackjit::jit::thunks::with_print_capture;
use stackjit::{interp, CompileError, MalformedProgram};

fn build(f: impl FnOnce(&mut ProgramBuilder)) -> Vec<u8> {
    let mut b = ProgramBuilder::new();
    f(&mut b);
    b.finish()
}

/// Run a program through the JIT and through the interpreter; both must
/// produce the same output, which is returned.
fn run_both(bytes: &[u8], inputs: &[i32]) -> Vec<i32> {
    let code = stackjit::compile(bytes).expect("program should compile");
    let ((), jit_out) = with_print_capture(|| unsafe { code.call(inputs) });

    let program = Program::parse(bytes).unwrap();
    let interp_out = interp::run(&program, inputs).expect("oracle should succeed");

    assert_eq!(jit_out, interp_out, "JIT and interpreter disagree");
    jit_out
}

/// The canonical multiply-by-repeated-addition program: `[count, value,
/// acc]` on the stack, forward jump into the loop body, always-taken
/// backward jump closing the loop.
fn multiply_program() -> Vec<u8> {
    build(|b| {
        b.input();
        b.input();
        b.constant(0);

        let test = b.offset();
        b.get(2);
        b.constant(0);
        b.cmp();
        let body = b.jgt_forward();

        b.get(0);
        b.print();
        b.halt();

        b.patch(body, b.offset());
        b.get(0);
        b.get(2);
        b.add();
        b.set(0);
        b.get(2);
        b.constant(-1);
        b.add();
        b.set(2);
        b.constant(1);
        b.jgt_to(test);
        b.halt();
    })
}

#[test]
fn multiply_canonical_cases() {
    let program = multiply_program();
    assert_eq!(run_both(&program, &[4, 5]), vec![20]);
    assert_eq!(run_both(&program, &[0, 7]), vec![0]);
    assert_eq!(run_both(&program, &[6, -3]), vec![-18]);
}

#[test]
fn forward_jump_links() {
    // Skip one print when the input is positive.
    let program = build(|b| {
        b.input();
        let skip = b.jgt_forward();
        b.constant(111);
        b.print();
        b.patch(skip, b.offset());
        b.constant(222);
        b.print();
        b.halt();
    });
    assert_eq!(run_both(&program, &[1]), vec![222]);
    assert_eq!(run_both(&program, &[0]), vec![111, 222]);
    assert_eq!(run_both(&program, &[-9]), vec![111, 222]);
}

#[test]
fn backward_jump_links() {
    // Count down from the input, printing each value.
    let program = build(|b| {
        b.input();
        let top = b.offset();
        b.get(0);
        b.print();
        b.constant(-1);
        b.add();
        b.get(0);
        b.jgt_to(top);
        b.discard();
        b.halt();
    });
    assert_eq!(run_both(&program, &[3]), vec![3, 2, 1]);
    assert_eq!(run_both(&program, &[1]), vec![1]);
}

#[test]
fn cmp_is_signed_at_the_extremes() {
    let cases = [
        (i32::MIN, i32::MAX, -1),
        (i32::MAX, i32::MIN, 1),
        (i32::MIN, i32::MIN, 0),
        (i32::MAX, i32::MAX, 0),
        (-1, 1, -1),
        (0, 0, 0),
        (1, -1, 1),
    ];
    for (a, b, expected) in cases {
        let program = build(|p| {
            p.input();
            p.input();
            p.cmp();
            p.print();
            p.halt();
        });
        assert_eq!(run_both(&program, &[a, b]), vec![expected], "cmp({}, {})", a, b);
    }
}

#[test]
fn add_wraps_like_i32() {
    let program = build(|b| {
        b.input();
        b.input();
        b.add();
        b.print();
        b.halt();
    });
    assert_eq!(run_both(&program, &[i32::MAX, 1]), vec![i32::MIN]);
    assert_eq!(run_both(&program, &[i32::MIN, -1]), vec![i32::MAX]);
    assert_eq!(run_both(&program, &[-2, 1]), vec![-1]);
}

#[test]
fn get_and_set_touch_exactly_one_slot() {
    // Build [1, 2, 3, 4], rewrite slot 2 via SET, then dump the stack.
    let program = build(|b| {
        for v in [1, 2, 3, 4] {
            b.constant(v);
        }
        b.get(0); //    copy of the top
        b.print(); //   4
        b.constant(-20);
        b.set(2); //    [1, -20, 3, 4]
        b.print(); //   4
        b.print(); //   3
        b.print(); //   -20
        b.print(); //   1
        b.halt();
    });
    assert_eq!(run_both(&program, &[]), vec![4, 4, 3, -20, 1]);
}

#[test]
fn discard_drops_one_value() {
    let program = build(|b| {
        b.constant(1);
        b.constant(2);
        b.discard();
        b.print();
        b.halt();
    });
    assert_eq!(run_both(&program, &[]), vec![1]);
}

#[test]
fn input_is_consumed_strictly_in_order() {
    let program = build(|b| {
        for _ in 0..4 {
            b.input();
            b.print();
        }
        b.halt();
    });
    assert_eq!(run_both(&program, &[10, -20, 30, -40]), vec![10, -20, 30, -40]);
}

#[test]
fn recompilation_is_independent() {
    let program = multiply_program();
    let first = stackjit::compile(&program).unwrap();
    let second = stackjit::compile(&program).unwrap();
    assert_ne!(first.entrypoint(), second.entrypoint());

    let ((), out_second) = with_print_capture(|| unsafe { second.call(&[7, 6]) });
    let ((), out_first) = with_print_capture(|| unsafe { first.call(&[7, 6]) });
    assert_eq!(out_first, vec![42]);
    assert_eq!(out_second, vec![42]);

    // The first region must still be alive and correct after the second
    // compilation and after dropping it.
    drop(second);
    let ((), again) = with_print_capture(|| unsafe { first.call(&[2, 2]) });
    assert_eq!(again, vec![4]);
}

#[test]
fn repeated_calls_reuse_one_region() {
    let program = multiply_program();
    let code = stackjit::compile(&program).unwrap();
    for (count, value, product) in [(1, 1, 1), (3, 3, 9), (10, -10, -100)] {
        let ((), out) = with_print_capture(|| unsafe { code.call(&[count, value]) });
        assert_eq!(out, vec![product]);
    }
}

#[test]
fn malformed_programs_are_rejected_before_emission() {
    // Underflow.
    let err = stackjit::compile(&build(|b| {
        b.add();
        b.halt();
    }))
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Malformed(MalformedProgram::StackUnderflow { offset: 0, .. })
    ));

    // Jump out of range.
    let err = stackjit::compile(&build(|b| {
        b.constant(1);
        b.jgt(-100);
        b.halt();
    }))
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Malformed(MalformedProgram::JumpOutOfRange { offset: 5, .. })
    ));

    // Control falling off the end.
    let err = stackjit::compile(&build(|b| {
        b.constant(1);
    }))
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Malformed(MalformedProgram::ControlFallsThrough { .. })
    ));

    // Truncated operand.
    let err = stackjit::compile(&[stackjit::bytecode::opcodes::GET, 1, 0]).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Malformed(MalformedProgram::TruncatedOperand { offset: 0 })
    ));
}

#[test]
fn oracle_agreement_on_a_mixed_corpus() {
    // A comparison-then-fold shuffle over the first two inputs.
    let shuffle = build(|b| {
        b.input(); //       a
        b.input(); //       b
        b.get(1);
        b.get(1);
        b.cmp(); //         sign of a ? b
        b.print();
        b.add(); //         a + b
        b.print();
        b.halt();
    });

    // Sum of four inputs, two at a time.
    let sums = build(|b| {
        b.input();
        b.input();
        b.add();
        b.input();
        b.input();
        b.add();
        b.add();
        b.print();
        b.halt();
    });

    // Triangular numbers with a loop: sum 1..=n.
    let triangle = build(|b| {
        b.input(); //       n
        b.constant(0); //   acc
        let test = b.offset();
        b.get(1);
        b.constant(0);
        b.cmp();
        let body = b.jgt_forward();
        b.print();
        b.halt();
        b.patch(body, b.offset());
        b.get(1);
        b.add(); //         acc += n
        b.get(1);
        b.constant(-1);
        b.add();
        b.set(1); //        n -= 1
        b.constant(1);
        b.jgt_to(test);
        b.halt();
    });

    for inputs in [[9, 3, 0, 0], [3, 9, -5, 5], [-4, -4, 100, -100]] {
        run_both(&shuffle, &inputs);
        run_both(&sums, &inputs);
    }
    assert_eq!(run_both(&triangle, &[5]), vec![15]);
    assert_eq!(run_both(&triangle, &[0]), vec![0]);
    assert_eq!(run_both(&triangle, &[-3]), vec![0]);
}
