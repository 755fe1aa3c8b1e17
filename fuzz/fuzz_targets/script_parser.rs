#![no_main]

use codpulse::script::Script;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must produce a parse error, never a panic
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(script) = Script::from_source(input) {
            for name in script.function_names() {
                let _ = script.function_source(name);
            }
        }
    }
});
