#![no_main]

use gantry_core::GantryError;
use gantry_core::parser::ast::Node;
use gantry_core::parser::{Consumer, FrontEnd};
use libfuzzer_sys::fuzz_target;

/// Renders statements to strings so NaN-carrying trees compare equal.
#[derive(Default, PartialEq, Debug)]
struct Collect {
    statements: Vec<String>,
    diagnostics: Vec<GantryError>,
}

impl Consumer for Collect {
    fn error(&mut self, diagnostic: &GantryError) {
        self.diagnostics.push(diagnostic.clone());
    }
    fn statement(&mut self, statement: Node) {
        self.statements.push(statement.to_string());
    }
}

fuzz_target!(|data: &[u8]| {
    // First byte picks the split point, the rest is the input.
    let Some((&pick, input)) = data.split_first() else {
        return;
    };
    if input.is_empty() {
        return;
    }
    let split = pick as usize % (input.len() + 1);

    let mut whole = FrontEnd::new(Collect::default());
    whole.feed(input);
    whole.finish();

    let mut chunked = FrontEnd::new(Collect::default());
    chunked.feed(&input[..split]);
    chunked.feed(&input[split..]);
    chunked.finish();

    assert_eq!(
        whole.into_consumer(),
        chunked.into_consumer(),
        "chunking changed the output (split at {split})"
    );
});
