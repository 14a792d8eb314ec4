//! Multiplies two integers by repeated addition, the hard way: the loop is
//! bytecode, the bytecode is JIT-compiled, and the product comes out of a
//! `PRINT` in generated code.

use stackjit::bytecode::builder::ProgramBuilder;
use stackjit::bytecode::Program;
use stackjit::interp;

/// The canonical demo program. Stack is `[count, value, acc]`; the loop
/// test jumps forward into the body while `count > 0`, and the body jumps
/// back with an always-taken `JGT` on a pushed 1. A non-positive count
/// never enters the body, so `0 * x` is 0 and the addend may be negative.
fn multiply_program() -> Vec<u8> {
    let mut b = ProgramBuilder::new();
    b.input(); //          count
    b.input(); //          value
    b.constant(0); //      acc

    let test = b.offset();
    b.get(2); //           count
    b.constant(0);
    b.cmp();
    let body = b.jgt_forward();

    b.get(0); //           acc
    b.print();
    b.halt();

    b.patch(body, b.offset());
    b.get(0); //           acc
    b.get(2); //           value
    b.add();
    b.set(0); //           acc += value
    b.get(2);
    b.constant(-1);
    b.add();
    b.set(2); //           count -= 1
    b.constant(1);
    b.jgt_to(test);
    b.halt();

    b.finish()
}

fn run() -> Result<(), String> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        println!("Usage: stackjit-multiply [options] <count> <value>");
        println!("Multiplies two integers by repeated addition in JIT-compiled bytecode.");
        println!("Options:");
        println!("  -h, --help: Print this help message");
        println!("  --interpret: Run the checked interpreter instead of the JIT");
        println!("  --dump-bytecode: Print the decoded program before running it");
        std::process::exit(0);
    }

    let interpret = args.contains("--interpret");
    let dump = args.contains("--dump-bytecode");

    let count: i32 = args.free_from_str().map_err(|e| e.to_string())?;
    let value: i32 = args.free_from_str().map_err(|e| e.to_string())?;

    let bytes = multiply_program();
    let inputs = [count, value];

    if dump {
        let program = Program::parse(&bytes).map_err(|e| e.to_string())?;
        print!("{}", program);
    }

    if interpret {
        let program = Program::parse(&bytes).map_err(|e| e.to_string())?;
        let output = interp::run(&program, &inputs).map_err(|e| e.to_string())?;
        for value in output {
            println!("{}", value);
        }
    } else {
        let code = stackjit::compile(&bytes).map_err(|e| e.to_string())?;
        unsafe { code.call(&inputs) };
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(message) = run() {
        eprintln!("stackjit-multiply: {}", message);
        std::process::exit(1);
    }
}
