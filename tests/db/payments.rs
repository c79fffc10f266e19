//! Payment lifecycle transitions and lookups

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_new_payment_is_pending_without_reference() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let payment = queries::create_payment(
        &conn,
        &CreatePayment {
            zone_id: zone.id.clone(),
            pricing_id: None,
            amount: 200,
            currency: "XOF".into(),
            phone: None,
        },
    )
    .unwrap();

    assert!(payment.id.starts_with("zt_pay_"));
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.external_ref, None);
    assert!(!payment.needs_reconciliation);
}

#[test]
fn test_external_ref_is_set_once() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let payment = create_pending_payment(&conn, &zone.id, "py_once");

    assert!(!queries::set_payment_external_ref(&conn, &payment.id, "py_other").unwrap());
    assert_eq!(get_payment(&conn, &payment.id).external_ref.as_deref(), Some("py_once"));
}

#[test]
fn test_lookup_by_either_reference() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let payment = create_pending_payment(&conn, &zone.id, "py_lookup");

    let by_id = queries::get_payment_by_reference(&conn, &payment.id).unwrap().unwrap();
    let by_ref = queries::get_payment_by_reference(&conn, "py_lookup").unwrap().unwrap();
    assert_eq!(by_id.id, payment.id);
    assert_eq!(by_ref.id, payment.id);
    assert!(queries::get_payment_by_reference(&conn, "py_missing").unwrap().is_none());
}

#[test]
fn test_complete_is_compare_and_swap() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let payment = create_pending_payment(&conn, &zone.id, "py_cas");

    assert!(queries::try_complete_payment(&conn, &payment.id, Some("TX-1")).unwrap());
    assert!(!queries::try_complete_payment(&conn, &payment.id, Some("TX-2")).unwrap());
    assert!(!queries::try_fail_payment(&conn, &payment.id).unwrap());

    let payment = get_payment(&conn, &payment.id);
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.transaction_id.as_deref(), Some("TX-1"));
    assert!(payment.completed_at.is_some());
    assert_eq!(payment.failed_at, None);
}

#[test]
fn test_failed_payment_never_completes() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let payment = create_pending_payment(&conn, &zone.id, "py_fail");

    assert!(queries::try_fail_payment(&conn, &payment.id).unwrap());
    assert!(!queries::try_complete_payment(&conn, &payment.id, None).unwrap());

    let payment = get_payment(&conn, &payment.id);
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(payment.failed_at.is_some());
    assert_eq!(payment.completed_at, None);
}

#[test]
fn test_reconciliation_flag_listing() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let flagged = create_pending_payment(&conn, &zone.id, "py_flagged");
    let _other = create_pending_payment(&conn, &zone.id, "py_other");

    queries::try_complete_payment(&conn, &flagged.id, None).unwrap();
    queries::set_payment_reconciliation(&conn, &flagged.id, true).unwrap();

    let listed = queries::list_payments_needing_reconciliation(&conn).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, flagged.id);

    queries::set_payment_reconciliation(&conn, &flagged.id, false).unwrap();
    assert!(queries::list_payments_needing_reconciliation(&conn).unwrap().is_empty());
}

#[test]
fn test_stale_pending_only_includes_polled_candidates() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let stale = create_pending_payment(&conn, &zone.id, "py_stale");
    let done = create_pending_payment(&conn, &zone.id, "py_done");
    queries::try_complete_payment(&conn, &done.id, None).unwrap();
    // No gateway reference yet: nothing to poll
    queries::create_payment(
        &conn,
        &CreatePayment {
            zone_id: zone.id.clone(),
            pricing_id: None,
            amount: 100,
            currency: "XOF".into(),
            phone: None,
        },
    )
    .unwrap();

    let cutoff = queries::now() + 1;
    let listed = queries::list_stale_pending_payments(&conn, cutoff, 10).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, stale.id);

    let none_yet = queries::list_stale_pending_payments(&conn, stale.created_at - 60, 10).unwrap();
    assert!(none_yet.is_empty());
}

#[test]
fn test_stale_pending_orders_least_recently_polled_first() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let oldest = create_pending_payment(&conn, &zone.id, "py_oldest");
    let older = create_pending_payment(&conn, &zone.id, "py_older");
    let newest = create_pending_payment(&conn, &zone.id, "py_newest");
    conn.execute("UPDATE payments SET created_at = created_at - 300 WHERE id = ?1", [&oldest.id])
        .unwrap();
    conn.execute("UPDATE payments SET created_at = created_at - 200 WHERE id = ?1", [&older.id])
        .unwrap();

    let cutoff = queries::now() + 1;
    let ids = |limit| -> Vec<String> {
        queries::list_stale_pending_payments(&conn, cutoff, limit)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect()
    };
    assert_eq!(ids(3), vec![oldest.id.clone(), older.id.clone(), newest.id.clone()]);

    let now = queries::now();
    queries::mark_payment_polled(&conn, &oldest.id, now).unwrap();
    queries::mark_payment_polled(&conn, &older.id, now - 10).unwrap();
    // Never polled first, then the stalest poll
    assert_eq!(ids(2), vec![newest.id.clone(), older.id.clone()]);
}

#[test]
fn test_zone_payments_filter_and_paginate() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    for n in 0..3 {
        create_pending_payment(&conn, &zone.id, &format!("py_page_{}", n));
    }
    let failed = create_pending_payment(&conn, &zone.id, "py_page_failed");
    queries::try_fail_payment(&conn, &failed.id).unwrap();

    let filters = PaymentFilters { status: Some(PaymentStatus::Pending) };
    let (items, total) =
        queries::list_payments_for_zone_paginated(&conn, &zone.id, &filters, 2, 0).unwrap();
    assert_eq!(total, 3);
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|p| p.status == PaymentStatus::Pending));

    let (all, total) =
        queries::list_payments_for_zone_paginated(&conn, &zone.id, &PaymentFilters::default(), 50, 0)
            .unwrap();
    assert_eq!(total, 4);
    assert_eq!(all.len(), 4);
}
