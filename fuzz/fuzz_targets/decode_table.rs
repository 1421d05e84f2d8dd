#![no_main]

use epicload_core::table::Table;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(table) = Table::decode("WorkItems", text) else {
        return;
    };

    // Every row is as wide as the header.
    for row in table.rows() {
        assert_eq!(row.len(), table.columns().len());
    }

    // Split form decodes back to the same table.
    let split = table.to_split_json().to_string();
    let again = Table::decode("WorkItems", &split).expect("split form must decode");
    assert_eq!(again.columns(), table.columns());
    assert_eq!(again.rows(), table.rows());
});
