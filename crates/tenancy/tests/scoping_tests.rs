//! Read-path scoping against a real SQLite database.

mod common;

use common::{ids, shop, shop_with_config};
use helios_tenancy::error::{ContextError, TenancyError};
use helios_tenancy::query::{Aggregate, SqlParam};
use helios_tenancy::tenant::{TenantStore, clear_current_tenant, with_tenant};
use helios_tenancy::TenancyConfig;
use serde_json::Value;

#[test]
fn test_rows_limited_to_current_tenant() {
    let shop = shop();
    let products = with_tenant(1, || {
        shop.products
            .all()
            .order_by("id", false)
            .unwrap()
            .fetch_all()
    })
    .unwrap();
    assert_eq!(ids(&products), vec![1, 3]);

    let products = with_tenant(2, || shop.products.all().fetch_all()).unwrap();
    assert_eq!(ids(&products), vec![2]);
}

#[test]
fn test_store_scoped_by_own_id() {
    let shop = shop();
    let stores = with_tenant(2, || shop.stores.all().fetch_all()).unwrap();
    assert_eq!(ids(&stores), vec![2]);
    assert_eq!(stores[0]["name"], Value::from("Mall Store"));
}

#[test]
fn test_no_tenant_runs_unscoped() {
    let shop = shop();
    clear_current_tenant();
    assert_eq!(shop.products.all().count().unwrap(), 3);
    assert_eq!(shop.purchases.all().count().unwrap(), 4);
}

#[test]
fn test_suspend_for_maintenance() {
    let shop = shop();
    let _tenant = TenantStore::enter(1);
    assert_eq!(shop.purchases.all().count().unwrap(), 3);
    {
        let _maintenance = TenantStore::suspend();
        assert_eq!(shop.purchases.all().count().unwrap(), 4);
    }
    assert_eq!(shop.purchases.all().count().unwrap(), 3);
}

#[test]
fn test_unscoped_entity_ignores_tenant() {
    let shop = shop();
    let countries = with_tenant(1, || shop.countries.all().count()).unwrap();
    assert_eq!(countries, 2);
}

#[test]
fn test_same_queryset_under_different_tenants() {
    let shop = shop();
    clear_current_tenant();
    let queryset = shop.purchases.unscoped();

    assert_eq!(with_tenant(1, || queryset.count()).unwrap(), 3);
    assert_eq!(with_tenant(2, || queryset.count()).unwrap(), 1);
    assert_eq!(queryset.count().unwrap(), 4);
}

#[test]
fn test_counts_aggregates_and_exists() {
    let shop = shop();
    with_tenant(1, || {
        let purchases = shop.purchases.all();
        assert_eq!(purchases.count().unwrap(), 3);
        assert_eq!(purchases.aggregate(&Aggregate::sum("quantity")).unwrap(), Value::from(21));
        assert_eq!(purchases.aggregate(&Aggregate::max("quantity")).unwrap(), Value::from(11));
        assert!(purchases.exists().unwrap());
    });
    with_tenant(2, || {
        let purchases = shop.purchases.all();
        assert_eq!(purchases.aggregate(&Aggregate::sum("quantity")).unwrap(), Value::from(5));
    });
}

#[test]
fn test_aggregate_over_no_rows_is_null() {
    let shop = shop();
    let total =
        with_tenant(99, || shop.purchases.all().aggregate(&Aggregate::sum("quantity"))).unwrap();
    assert_eq!(total, Value::Null);
    assert!(!with_tenant(99, || shop.purchases.all().exists()).unwrap());
}

#[test]
fn test_limited_count_respects_limit() {
    let shop = shop();
    let count = with_tenant(1, || shop.purchases.all().limit(2).count()).unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_get_of_other_tenant_row_does_not_exist() {
    let shop = shop();
    let err = with_tenant(1, || shop.products.all().filter_eq("id", 2).unwrap().get()).unwrap_err();
    assert!(matches!(
        err,
        TenancyError::Query(helios_tenancy::error::QueryError::DoesNotExist { .. })
    ));

    let banana = with_tenant(2, || shop.products.all().filter_eq("id", 2).unwrap().get()).unwrap();
    assert_eq!(banana["name"], Value::from("Banana"));
}

#[test]
fn test_first_and_iter() {
    let shop = shop();
    with_tenant(1, || {
        let first = shop
            .products
            .all()
            .order_by("name", true)
            .unwrap()
            .first()
            .unwrap()
            .unwrap();
        assert_eq!(first["name"], Value::from("Cherry"));

        let names: Vec<Value> = shop
            .products
            .all()
            .iter()
            .unwrap()
            .map(|row| row["name"].clone())
            .collect();
        assert_eq!(names.len(), 2);
    });
}

#[test]
fn test_first_keeps_zero_limit() {
    let shop = shop();
    let first = with_tenant(1, || shop.products.all().limit(0).first()).unwrap();
    assert!(first.is_none());

    let first = with_tenant(1, || shop.products.all().limit(5).first()).unwrap();
    assert!(first.is_some());
}

#[test]
fn test_subquery_scoped_with_outer_query() {
    let shop = shop();
    clear_current_tenant();
    let bananas = shop.products.unscoped().filter_eq("name", "Banana").unwrap();
    let purchases = shop.purchases.unscoped().filter_in("product_id", &bananas, "id").unwrap();

    // purchases 2 and 4 both point at Banana
    assert_eq!(purchases.count().unwrap(), 2);
    // under tenant 1 the Banana product is invisible, so nothing matches
    assert_eq!(with_tenant(1, || purchases.count()).unwrap(), 0);
    // under tenant 2 only store 2's purchase remains
    let rows = with_tenant(2, || purchases.fetch_all()).unwrap();
    assert_eq!(ids(&rows), vec![2]);
}

#[test]
fn test_as_subquery_is_scoped() {
    let shop = shop();
    let sql = with_tenant(1, || shop.products.unscoped().as_subquery("id")).unwrap();
    assert!(sql.sql.starts_with("SELECT \"products\".\"id\" FROM \"products\""));
    assert_eq!(sql.params, vec![SqlParam::Integer(1)]);
}

#[test]
fn test_deny_policy_rejects_missing_tenant() {
    let shop = shop_with_config(TenancyConfig::new().with_deny_missing_tenant());
    clear_current_tenant();

    let err = shop.products.all().fetch_all().unwrap_err();
    match err {
        TenancyError::Context(ContextError::MissingTenant { table }) => {
            assert_eq!(table, "products")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // unscoped entities are unaffected
    assert_eq!(shop.countries.all().count().unwrap(), 2);
    // and scoped ones work once a tenant is set
    assert_eq!(with_tenant(1, || shop.products.all().count()).unwrap(), 2);
}
