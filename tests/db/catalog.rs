//! Zone and pricing maintenance

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_update_zone_sets_and_clears_fields() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");

    let updated = queries::update_zone(
        &conn,
        &zone.id,
        &UpdateZone {
            name: Some("  Grand Market ".into()),
            router_ip: Some(None),
            ..Default::default()
        },
    )
    .unwrap()
    .unwrap();
    assert_eq!(updated.name, "Grand Market");
    assert_eq!(updated.router_ip, None);
    // Untouched
    assert_eq!(updated.location.as_deref(), Some("Cotonou"));

    assert!(queries::update_zone(&conn, &zone.id, &UpdateZone::default()).unwrap().is_none());
    assert!(
        queries::update_zone(&conn, "zt_zone_missing", &UpdateZone { name: Some("x".into()), ..Default::default() })
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_delete_zone_cascades_inventory() {
    let mut conn = setup_test_db();
    let zone = create_test_zone(&conn, "Pop-up");
    let pricing = create_test_pricing(&conn, &zone.id, 100);
    import_test_tickets(&mut conn, &zone.id, "popup", 3);

    assert!(queries::delete_zone(&conn, &zone.id).unwrap());
    assert!(queries::get_zone_by_id(&conn, &zone.id).unwrap().is_none());
    assert!(queries::get_pricing_by_id(&conn, &pricing.id).unwrap().is_none());
    assert_eq!(queries::get_ticket_stats(&conn, &zone.id).unwrap().total, 0);

    assert!(!queries::delete_zone(&conn, &zone.id).unwrap());
}

#[test]
fn test_delete_zone_refused_once_it_has_payments() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Station");
    let payment = create_pending_payment(&conn, &zone.id, "py_station");

    assert!(!queries::delete_zone(&conn, &zone.id).unwrap());
    assert!(queries::get_zone_by_id(&conn, &zone.id).unwrap().is_some());
    assert!(queries::get_payment_by_id(&conn, &payment.id).unwrap().is_some());
}

#[test]
fn test_deactivated_pricing_is_not_sellable() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let pricing = create_test_pricing(&conn, &zone.id, 200);

    let updated = queries::update_pricing(
        &conn,
        &pricing.id,
        &UpdatePricing {
            amount: Some(250),
            is_active: Some(false),
            ..Default::default()
        },
    )
    .unwrap()
    .unwrap();
    assert_eq!(updated.amount, 250);
    assert!(!updated.is_active);
    assert!(updated.updated_at >= pricing.updated_at);

    assert!(queries::get_active_pricing_for_zone(&conn, &pricing.id, &zone.id).unwrap().is_none());
    assert!(queries::list_pricings_for_zone(&conn, &zone.id, true).unwrap().is_empty());
    assert_eq!(queries::list_pricings_for_zone(&conn, &zone.id, false).unwrap().len(), 1);
}

#[test]
fn test_delete_pricing_keeps_payments() {
    let conn = setup_test_db();
    let zone = create_test_zone(&conn, "Market");
    let pricing = create_test_pricing(&conn, &zone.id, 500);
    let payment = queries::create_payment(
        &conn,
        &CreatePayment {
            zone_id: zone.id.clone(),
            pricing_id: Some(pricing.id.clone()),
            amount: 500,
            currency: "XOF".into(),
            phone: None,
        },
    )
    .unwrap();

    assert!(queries::delete_pricing(&conn, &pricing.id).unwrap());
    assert!(!queries::delete_pricing(&conn, &pricing.id).unwrap());

    let payment = get_payment(&conn, &payment.id);
    assert_eq!(payment.pricing_id, None);
    assert_eq!(payment.amount, 500);
}
