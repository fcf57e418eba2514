//! Ordered pool contract tests, run against every backend

use agg_primitives::{Address, Nonce, U256};
use agg_storage::{Database, MemoryPool, OrderedPool, PoolError, PoolTable, RocksPool};
use agg_types::OperationRecord;
use tempfile::TempDir;

fn account(n: u8) -> Address {
    Address::from_bytes([n; 20])
}

fn op(who: u8, nonce: Nonce) -> OperationRecord {
    OperationRecord::new(account(who), nonce, U256::from(100u64), vec![who, nonce as u8, 0xaa])
}

fn nonces(records: &[OperationRecord]) -> Vec<Nonce> {
    records.iter().map(|r| r.nonce).collect()
}

fn ids(records: &[OperationRecord]) -> Vec<u64> {
    records.iter().filter_map(|r| r.id).collect()
}

// =============================================================================
// Contract
// =============================================================================

fn add_assigns_increasing_serials(pool: &dyn OrderedPool) {
    let first = pool.add(vec![op(1, 0), op(2, 0)]).unwrap();
    let second = pool.add(vec![op(1, 1)]).unwrap();

    let mut all = ids(&first);
    all.extend(ids(&second));
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0] < w[1]));
    assert!(first.iter().zip([op(1, 0), op(2, 0)]).all(|(s, o)| s.same_content(&o)));
}

fn add_rejects_duplicate_key_atomically(pool: &dyn OrderedPool) {
    pool.add(vec![op(1, 0)]).unwrap();

    let result = pool.add(vec![op(1, 1), op(1, 0)]);
    assert!(matches!(result, Err(PoolError::DuplicateKey(key)) if key.nonce == 0));
    assert_eq!(pool.count().unwrap(), 1);
    assert!(pool.find(&account(1), 1).unwrap().is_none());
}

fn remove_requires_existing_records(pool: &dyn OrderedPool) {
    let stored = pool.add(vec![op(1, 0), op(1, 1)]).unwrap();

    let result = pool.remove(&[op(1, 0), op(1, 7)]);
    assert!(matches!(result, Err(PoolError::NotFound(key)) if key.nonce == 7));
    assert_eq!(pool.count().unwrap(), 2);

    pool.remove(&stored).unwrap();
    assert!(pool.is_empty().unwrap());
}

fn find_returns_stored_record(pool: &dyn OrderedPool) {
    let stored = pool.add(vec![op(3, 9)]).unwrap();
    assert_eq!(pool.find(&account(3), 9).unwrap(), Some(stored[0].clone()));
    assert!(pool.find(&account(3), 8).unwrap().is_none());
    assert!(pool.find(&account(4), 9).unwrap().is_none());
}

fn find_after_is_ascending_and_bounded(pool: &dyn OrderedPool) {
    pool.add(vec![op(1, 4), op(1, 2), op(2, 3), op(1, 5), op(1, 3)]).unwrap();

    assert_eq!(nonces(&pool.find_after(&account(1), 2, 10).unwrap()), vec![3, 4, 5]);
    assert_eq!(nonces(&pool.find_after(&account(1), 2, 2).unwrap()), vec![3, 4]);
    assert_eq!(nonces(&pool.find_after(&account(1), 0, 1).unwrap()), vec![2]);
    assert!(pool.find_after(&account(1), 5, 10).unwrap().is_empty());
    assert!(pool.find_after(&account(9), 0, 10).unwrap().is_empty());
}

fn by_account_in_nonce_order_ignores_insertion_order(pool: &dyn OrderedPool) {
    pool.add(vec![op(1, 7)]).unwrap();
    pool.add(vec![op(2, 1)]).unwrap();
    pool.add(vec![op(1, 2)]).unwrap();
    pool.add(vec![op(1, 5)]).unwrap();

    assert_eq!(nonces(&pool.by_account_in_nonce_order(&account(1), 10).unwrap()), vec![2, 5, 7]);
    assert_eq!(nonces(&pool.by_account_in_nonce_order(&account(1), 2).unwrap()), vec![2, 5]);
    assert_eq!(nonces(&pool.by_account_in_nonce_order(&account(2), 10).unwrap()), vec![1]);
}

fn next_nonce_of_is_highest_plus_one(pool: &dyn OrderedPool) {
    assert_eq!(pool.next_nonce_of(&account(1)).unwrap(), None);
    pool.add(vec![op(1, 3), op(1, 10), op(2, 50)]).unwrap();
    assert_eq!(pool.next_nonce_of(&account(1)).unwrap(), Some(11));
    assert_eq!(pool.next_nonce_of(&account(2)).unwrap(), Some(51));
}

fn first_and_oldest_follow_serials(pool: &dyn OrderedPool) {
    assert!(pool.first().unwrap().is_none());

    let a = pool.add(vec![op(2, 0)]).unwrap();
    pool.add(vec![op(1, 0)]).unwrap();
    pool.add(vec![op(3, 0)]).unwrap();

    assert_eq!(pool.first().unwrap(), Some(a[0].clone()));
    let oldest = pool.oldest(2).unwrap();
    assert_eq!(oldest.iter().map(|r| r.account).collect::<Vec<_>>(), vec![account(2), account(1)]);

    pool.remove(&a).unwrap();
    assert_eq!(pool.first().unwrap().map(|r| r.account), Some(account(1)));
}

fn clear_before_id_spans_accounts(pool: &dyn OrderedPool) {
    let stored = pool
        .add(vec![op(1, 1), op(2, 1), op(1, 2), op(3, 1)])
        .unwrap();
    let threshold = stored[2].id.unwrap();

    let cleared = pool.clear_before_id(threshold).unwrap();
    assert_eq!(cleared, 2);
    assert_eq!(pool.count().unwrap(), 2);
    assert!(pool.find(&account(1), 1).unwrap().is_none());
    assert!(pool.find(&account(2), 1).unwrap().is_none());
    assert!(pool.find(&account(1), 2).unwrap().is_some());
    assert_eq!(pool.next_nonce_of(&account(2)).unwrap(), None);

    assert_eq!(pool.clear_before_id(threshold).unwrap(), 0);
}

fn reinsertion_gets_fresh_serial(pool: &dyn OrderedPool) {
    let stored = pool.add(vec![op(1, 0)]).unwrap();
    pool.remove(&stored).unwrap();
    let again = pool.add(vec![stored[0].unstored()]).unwrap();

    assert!(again[0].id > stored[0].id);
    assert!(again[0].same_content(&stored[0]));
}

fn run_contract(make: &dyn Fn() -> Box<dyn OrderedPool>) {
    let cases: &[(&str, fn(&dyn OrderedPool))] = &[
        ("add_assigns_increasing_serials", add_assigns_increasing_serials),
        ("add_rejects_duplicate_key_atomically", add_rejects_duplicate_key_atomically),
        ("remove_requires_existing_records", remove_requires_existing_records),
        ("find_returns_stored_record", find_returns_stored_record),
        ("find_after_is_ascending_and_bounded", find_after_is_ascending_and_bounded),
        (
            "by_account_in_nonce_order_ignores_insertion_order",
            by_account_in_nonce_order_ignores_insertion_order,
        ),
        ("next_nonce_of_is_highest_plus_one", next_nonce_of_is_highest_plus_one),
        ("first_and_oldest_follow_serials", first_and_oldest_follow_serials),
        ("clear_before_id_spans_accounts", clear_before_id_spans_accounts),
        ("reinsertion_gets_fresh_serial", reinsertion_gets_fresh_serial),
    ];

    for (name, case) in cases {
        let pool = make();
        eprintln!("contract case: {}", name);
        case(pool.as_ref());
    }
}

// =============================================================================
// Backends
// =============================================================================

#[test]
fn test_memory_pool_contract() {
    run_contract(&|| -> Box<dyn OrderedPool> { Box::new(MemoryPool::new()) });
}

#[test]
fn test_rocks_pool_contract() {
    let dirs = std::cell::RefCell::new(Vec::new());
    run_contract(&|| -> Box<dyn OrderedPool> {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());
        db.open().unwrap();
        dirs.borrow_mut().push(dir);
        Box::new(RocksPool::open(db, PoolTable::Future).unwrap())
    });
}

#[test]
fn test_rocks_pool_contract_ready_table() {
    let dirs = std::cell::RefCell::new(Vec::new());
    run_contract(&|| -> Box<dyn OrderedPool> {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());
        db.open().unwrap();
        dirs.borrow_mut().push(dir);
        Box::new(RocksPool::open(db, PoolTable::Ready).unwrap())
    });
}
