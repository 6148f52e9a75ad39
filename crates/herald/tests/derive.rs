use std::sync::Arc;

use herald::prelude::*;
use herald::{
    BoxedMessage, NotificationAdapter, NotificationDispatch, RequestDescriptor, Satisfies, TypeKey,
};
use support::Log;

mod support {
    use std::sync::{Arc, Mutex};

    /// Ordered record of what handlers observed.
    #[derive(Clone, Default)]
    pub struct Log(Arc<Mutex<Vec<String>>>);

    impl Log {
        pub fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        pub fn sorted(&self) -> Vec<String> {
            let mut entries = self.0.lock().unwrap().clone();
            entries.sort();
            entries
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Request)]
#[request(response = u64)]
struct GetBalance {
    account: String,
}

#[derive(Debug, Clone, Request)]
#[request(name = "ledger.close")]
struct CloseAccount(String);

trait AuditEvent: Send + Sync {
    fn subject(&self) -> String;
}

#[derive(Debug, Clone, Notification)]
#[notification(observe_as(dyn AuditEvent))]
struct BalanceChanged {
    account: String,
}

impl AuditEvent for BalanceChanged {
    fn subject(&self) -> String {
        format!("balance:{}", self.account)
    }
}

#[derive(Debug, Clone, Notification)]
struct Deposited {
    #[notification(parent)]
    change: BalanceChanged,
    amount: u64,
}

#[derive(Debug, Clone, Notification)]
#[notification(name = "ledger.heartbeat")]
struct Heartbeat;

// ============================================================================
// Handlers
// ============================================================================

struct Observer(Log);

#[async_trait]
impl NotificationHandler<BalanceChanged> for Observer {
    async fn handle(&self, event: &BalanceChanged, _cancel: &CancellationToken) -> HandlerResult<()> {
        self.0.push(format!("changed:{}", event.account));
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler<dyn AuditEvent> for Observer {
    async fn handle(
        &self,
        event: &(dyn AuditEvent + 'static),
        _cancel: &CancellationToken,
    ) -> HandlerResult<()> {
        self.0.push(format!("audit:{}", event.subject()));
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler<Deposited> for Observer {
    async fn handle(&self, event: &Deposited, _cancel: &CancellationToken) -> HandlerResult<()> {
        self.0.push(format!("deposited:{}", event.amount));
        Ok(())
    }
}

fn registry_with_observers(log: &Log) -> Arc<ServiceRegistry> {
    let registry = Arc::new(ServiceRegistry::new());
    registry
        .notification_handler::<BalanceChanged>(Observer(log.clone()))
        .notification_handler::<dyn AuditEvent>(Observer(log.clone()))
        .notification_handler::<Deposited>(Observer(log.clone()));
    registry
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn derived_request_carries_response_type() {
    let registry = Arc::new(ServiceRegistry::new());
    registry.request_handler(request_fn(|q: GetBalance, _| async move {
        Ok(q.account.len() as u64 * 10)
    }));

    let mediator = Mediator::new(registry);
    let balance = mediator
        .send(GetBalance { account: "ada".into() }, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(balance, 30);

    let message = BoxedMessage::new(GetBalance { account: "bob".into() });
    assert_eq!(
        message.request_descriptor().map(|d| d.key()),
        Some(TypeKey::of::<GetBalance>())
    );
    assert!(message.notification_descriptor().is_none());
}

#[tokio::test]
async fn request_without_response_defaults_to_unit() {
    let registry = Arc::new(ServiceRegistry::new());
    registry.request_handler(request_fn(|_: CloseAccount, _| Unit::completed()));

    let reply = Mediator::new(registry)
        .send(CloseAccount("ada".into()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply, Unit::VALUE);

    let message = CloseAccount("ada".into());
    assert_eq!(message.message_name(), "ledger.close");
    assert_eq!(
        RequestDescriptor::of::<CloseAccount>().key(),
        TypeKey::of::<CloseAccount>()
    );
}

#[test]
fn parent_field_provides_the_parent_view() {
    let deposited = Deposited {
        change: BalanceChanged {
            account: "ada".into(),
        },
        amount: 5,
    };
    let parent: &BalanceChanged = Satisfies::<BalanceChanged>::upcast(&deposited);
    assert_eq!(parent.account, "ada");

    let audit: &dyn AuditEvent = Satisfies::<dyn AuditEvent>::upcast(parent);
    assert_eq!(audit.subject(), "balance:ada");
}

#[test]
fn derived_routes_include_lifted_parent_supertypes() {
    let adapter = NotificationAdapter::<Deposited>::new();
    assert_eq!(
        adapter.route_keys(),
        vec![
            TypeKey::of::<Deposited>(),
            TypeKey::of::<BalanceChanged>(),
            TypeKey::of::<dyn AuditEvent>(),
        ]
    );
}

#[tokio::test]
async fn publish_reaches_parent_and_trait_object_handlers() {
    let log = Log::default();
    let mediator = Mediator::new(registry_with_observers(&log));

    mediator
        .publish(
            Deposited {
                change: BalanceChanged {
                    account: "ada".into(),
                },
                amount: 7,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        log.sorted(),
        vec!["audit:balance:ada", "changed:ada", "deposited:7"]
    );
}

#[tokio::test]
async fn untyped_publish_uses_derived_descriptor() {
    let log = Log::default();
    let mediator = Mediator::new(registry_with_observers(&log));

    let message = BoxedMessage::new(BalanceChanged {
        account: "bob".into(),
    });
    mediator
        .publish_untyped(message, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(log.sorted(), vec!["audit:balance:bob", "changed:bob"]);
}

#[tokio::test]
async fn unit_notification_with_custom_name() {
    assert_eq!(Heartbeat.message_name(), "ledger.heartbeat");

    let registry = Arc::new(ServiceRegistry::new());
    let mediator = Mediator::new(registry);
    mediator
        .publish(Heartbeat, &CancellationToken::new())
        .await
        .unwrap();
}
