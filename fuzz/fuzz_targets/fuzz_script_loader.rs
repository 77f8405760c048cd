#![no_main]

use isynth_core::load_script;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The loader must never panic, whatever the JSON looks like.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok((script, report)) = load_script(text) {
        let _ = script.sub_action_count();
        let _ = script.declared_duration();
        let _ = report.is_clean();
    }
});
