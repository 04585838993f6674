use std::collections::BTreeSet;

use crate::codes::issue_codes;

#[test]
fn codes_are_six_digits_and_unique() {
    let codes = issue_codes(["SupplierA", "SupplierB", "SupplierC"]);
    assert_eq!(codes.len(), 3);
    for code in codes.values() {
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
    let unique: BTreeSet<_> = codes.values().collect();
    assert_eq!(unique.len(), 3);
}

#[test]
fn empty_invite_list_yields_no_codes() {
    assert!(issue_codes(Vec::<String>::new()).is_empty());
}
