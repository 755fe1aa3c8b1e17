#![no_main]

use codpulse::instrument::instrument;
use codpulse::preprocess::Preprocessor;
use codpulse::script::parser::parse_program;
use codpulse::script::Script;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(script) = Script::from_source(input) else {
        return;
    };
    let preprocessor = Preprocessor::default();
    for name in script.function_names() {
        if let Ok(source) = script.function_source(name) {
            let rewritten = instrument(&preprocessor.process(&source));
            // a function that parses must still parse once instrumented
            assert!(
                parse_program(&rewritten.source).is_ok(),
                "instrumented source does not parse:\n{}",
                rewritten.source
            );
        }
    }
});
