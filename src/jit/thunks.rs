//! Runtime routines the generated code calls by absolute address.

use std::cell::RefCell;

thread_local! {
    static SINK: RefCell<Option<Vec<i32>>> = RefCell::new(None);
}

/// Target of the `PRINT` template. Receives the popped slot as a full
/// (sign-extended) word and prints one signed decimal per line, or appends
/// to the capture sink when one is installed on this thread.
///
/// Must stay `extern "C"`: the template moves the value into the first
/// argument register and assumes every caller-saved register is dead after
/// the call.
pub extern "C" fn jit_print(value: i64) {
    let value = value as i32;
    SINK.with(|sink| match &mut *sink.borrow_mut() {
        Some(buffer) => buffer.push(value),
        None => println!("{}", value),
    });
}

/// Run `f` with `PRINT` output redirected into a buffer on this thread.
/// Invocations on other threads keep printing to stdout.
pub fn with_print_capture<R>(f: impl FnOnce() -> R) -> (R, Vec<i32>) {
    SINK.with(|sink| {
        let previous = sink.borrow_mut().replace(Vec::new());
        let result = f();
        let captured = sink
            .borrow_mut()
            .take()
            .expect("print sink removed during capture");
        *sink.borrow_mut() = previous;
        (result, captured)
    })
}
