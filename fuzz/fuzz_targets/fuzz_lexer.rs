#![no_main]

use gantry_core::GantryError;
use gantry_core::parser::ast::Node;
use gantry_core::parser::{Consumer, FrontEnd};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Count {
    statements: usize,
    diagnostics: usize,
}

impl Consumer for Count {
    fn error(&mut self, diagnostic: &GantryError) {
        // Every diagnostic must render.
        let _ = diagnostic.to_string();
        self.diagnostics += 1;
    }
    fn statement(&mut self, statement: Node) {
        // Every delivered tree must render without panicking.
        let _ = statement.to_string();
        self.statements += 1;
    }
}

fuzz_target!(|data: &[u8]| {
    let mut front_end = FrontEnd::new(Count::default());
    front_end.feed(data);
    front_end.finish();
    // Finish must be idempotent.
    front_end.finish();

    // Whatever the input did, the machine must stay reusable.
    front_end.reset();
    let before = front_end.consumer().statements;
    front_end.feed(b"G1 X1\n");
    let after = front_end.consumer().statements;
    assert_eq!(after, before + 1, "machine not reusable after reset");
});
