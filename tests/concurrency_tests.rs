use marketflow::application::engine::Engine;
use marketflow::domain::money::Price;
use marketflow::domain::party::{NewBusiness, NewSellable, NewUser, SellableKind, UserRole};
use marketflow::domain::ports::{ChatStore, DirectoryStore, DisputeStore};
use marketflow::domain::transaction::{ItemInput, TransactionStatus};
use marketflow::error::EngineError;
use marketflow::infrastructure::in_memory::InMemoryStore;
use rust_decimal_macros::dec;

fn engine(store: &InMemoryStore) -> Engine {
    Engine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
    )
}

async fn seed(store: &InMemoryStore) -> (u64, u64, u64, u64) {
    let owner = store
        .insert_user(NewUser {
            name: "Olive".to_string(),
            email: "olive@example.com".to_string(),
            role: UserRole::BusinessOwner,
        })
        .await
        .unwrap();
    let customer = store
        .insert_user(NewUser {
            name: "Cass".to_string(),
            email: "cass@example.com".to_string(),
            role: UserRole::Customer,
        })
        .await
        .unwrap();
    let business = store
        .insert_business(NewBusiness {
            owner_id: owner.id,
            name: "Olive's Oddities".to_string(),
            description: None,
            category: None,
            location_id: None,
        })
        .await
        .unwrap();
    let sellable = store
        .insert_sellable(NewSellable {
            business_id: business.id,
            name: "Widget".to_string(),
            kind: SellableKind::Product,
            price: Price::new(dec!(100)).unwrap(),
            description: None,
        })
        .await
        .unwrap();
    (owner.id, customer.id, business.id, sellable.id)
}

async fn pending_transaction(
    engine: &Engine,
    owner: u64,
    customer: u64,
    business: u64,
    sellable: u64,
) -> u64 {
    let (transaction, _) = engine
        .create_transaction(
            owner,
            business,
            customer,
            vec![ItemInput {
                sellable_id: sellable,
                quantity: 1,
                price: dec!(100),
            }],
            None,
            None,
        )
        .await
        .unwrap();
    transaction.id
}

#[tokio::test]
async fn test_racing_dispute_creation_has_one_winner() {
    let store = InMemoryStore::new();
    let (owner, customer, business, sellable) = seed(&store).await;
    let first = engine(&store);
    let second = engine(&store);
    let transaction = pending_transaction(&first, owner, customer, business, sellable).await;

    let (a, b) = tokio::join!(
        first.open_dispute(customer, transaction, "too slow".to_string(), None),
        second.open_dispute(owner, transaction, "refusing pickup".to_string(), None),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(EngineError::Conflict(_))))
    );
    // Exactly one dispute exists, with exactly one opening message.
    let dispute = store.for_transaction(transaction).await.unwrap().unwrap();
    assert_eq!(DisputeStore::messages(&store, dispute.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_racing_status_updates_apply_once() {
    let store = InMemoryStore::new();
    let (owner, customer, business, sellable) = seed(&store).await;
    let first = engine(&store);
    let second = engine(&store);
    let transaction = pending_transaction(&first, owner, customer, business, sellable).await;
    let before = ChatStore::messages(&store, 1).await.unwrap().len();

    let (a, b) = tokio::join!(
        first.update_transaction_status(
            customer,
            transaction,
            TransactionStatus::Approved,
            None,
            None,
        ),
        second.update_transaction_status(
            customer,
            transaction,
            TransactionStatus::Approved,
            None,
            None,
        ),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(EngineError::InvalidTransition)))
    );
    // The losing update must not have appended an audit message.
    let after = ChatStore::messages(&store, 1).await.unwrap().len();
    assert_eq!(after, before + 1);
}
