#![no_main]

use chrono::NaiveDate;
use epicload_core::config::ProjectConfig;
use epicload_core::{Snapshot, run};
use libfuzzer_sys::fuzz_target;

// Input layout: items JSON, a NUL byte, team JSON.
fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|b| *b == 0) else {
        return;
    };
    let (Ok(items), Ok(team)) = (
        std::str::from_utf8(&data[..split]),
        std::str::from_utf8(&data[split + 1..]),
    ) else {
        return;
    };
    let Ok(snapshot) = Snapshot::decode(items, team) else {
        return;
    };
    let Some(today) = NaiveDate::from_ymd_opt(2025, 1, 8) else {
        return;
    };

    // Rejections are fine; panics are not.
    if let Ok(out) = run(&snapshot, &ProjectConfig::default(), today) {
        for load in &out.loads {
            assert_eq!(load.weekly.len(), out.grid.weeks().len());
        }
    }
});
