use crate::session::{Principal, SessionStore};

#[test]
fn tokens_resolve_to_their_principal() {
    let sessions = SessionStore::new();
    let admin = sessions.issue(Principal::Admin);
    let supplier = sessions.issue(Principal::Supplier {
        project_id: "p-1".to_owned(),
        supplier: "SupplierA".to_owned(),
    });

    assert_ne!(admin, supplier);
    assert_eq!(sessions.resolve(&admin), Some(Principal::Admin));
    assert_eq!(
        sessions.resolve(&supplier),
        Some(Principal::Supplier {
            project_id: "p-1".to_owned(),
            supplier: "SupplierA".to_owned(),
        })
    );
    assert_eq!(sessions.resolve("made-up-token"), None);
}

#[test]
fn revoked_tokens_stop_resolving() {
    let sessions = SessionStore::new();
    let token = sessions.issue(Principal::Admin);
    sessions.revoke(&token);
    assert_eq!(sessions.resolve(&token), None);
}
