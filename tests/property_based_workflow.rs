// Property-Based Testing for the request workflow
// Random action sequences from random actors must never break record invariants

use proptest::prelude::*;
use shop_workflow::requests::{InMemoryCart, InMemoryRequestStore, StaticDirectory};
use shop_workflow::{
    Action, ActionKind, Actor, NewRequest, ProjectDetails, Stage, WorkflowEngine, WorkflowError,
};
use std::sync::Arc;

fn technician_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("lara".to_string()),
        Just("sam".to_string()),
        Just("  ".to_string()),
    ]
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        technician_strategy().prop_map(|technician| Action::Assign { technician }),
        technician_strategy().prop_map(|technician| Action::Reassign { technician }),
        Just(Action::Start),
        Just(Action::MarkReady),
        Just(Action::AddToCart),
        prop::option::of("[a-z ]{0,12}").prop_map(|reason| Action::Cancel { reason }),
    ]
}

fn actor_strategy() -> impl Strategy<Value = Actor> {
    prop_oneof![
        Just(Actor::staff("lara")),
        Just(Actor::staff("sam")),
        Just(Actor::customer("ada@uni.edu")),
        Just(Actor::customer("eve@uni.edu")),
    ]
}

fn engine() -> (WorkflowEngine, Arc<InMemoryCart>) {
    let cart = Arc::new(InMemoryCart::new());
    let engine = WorkflowEngine::new(
        Arc::new(InMemoryRequestStore::new()),
        cart.clone(),
        Arc::new(StaticDirectory::new(["lara", "sam"])),
    );
    (engine, cart)
}

fn submission() -> NewRequest {
    NewRequest {
        customer_name: "Ada".to_string(),
        customer_email: "ada@uni.edu".to_string(),
        comments: None,
        project_file_name: "case.stl".to_string(),
        details: ProjectDetails::Print3d {
            quantity: 1,
            filament_color: "white".to_string(),
        },
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_invariants_hold_over_any_action_sequence(
        steps in prop::collection::vec((action_strategy(), actor_strategy()), 1..24)
    ) {
        runtime().block_on(async {
            let (engine, cart) = engine();
            let request = engine.submit(submission(), &Actor::staff("lara")).await.unwrap();
            let mut current = request.clone();

            for (action, actor) in steps {
                let before = current.clone();
                let result = engine.apply_action(request.id, action.clone(), &actor).await;
                let after = engine.get(request.id).await.unwrap();

                after.check_invariants().unwrap();
                assert!(after.updated_at >= after.requested_at);
                assert!(after.updated_at >= before.updated_at);

                if before.status.is_terminal() {
                    assert!(matches!(result, Err(WorkflowError::InvalidTransition { .. })));
                }
                match &result {
                    Err(_) => assert_eq!(after, before),
                    Ok(returned) => {
                        assert_eq!(returned, &after);
                        if after.version != before.version {
                            assert_ne!(
                                (after.status, &after.assigned_to, &after.cancellation_reason),
                                (before.status, &before.assigned_to, &before.cancellation_reason)
                            );
                        }
                        if after.status == Stage::Finished {
                            assert_eq!(action.kind(), ActionKind::AddToCart);
                        }
                    }
                }
                if after.status == Stage::Canceled && before.status != Stage::Canceled {
                    assert!(actor.is_staff());
                }
                current = after;
            }

            let finished = current.status == Stage::Finished;
            assert_eq!(cart.items().await.len(), usize::from(finished));
        });
    }

    #[test]
    fn prop_customers_never_move_requests_except_to_finished(
        action in action_strategy()
    ) {
        runtime().block_on(async {
            let (engine, _) = engine();
            let staff = Actor::staff("sam");
            let request = engine.submit(submission(), &staff).await.unwrap();
            let result = engine
                .apply_action(request.id, action.clone(), &Actor::customer("ada@uni.edu"))
                .await;

            // Nothing is ready for pickup yet, so every customer action fails
            assert!(result.is_err());
            assert_eq!(engine.get(request.id).await.unwrap(), request);
        });
    }
}

#[tokio::test]
async fn test_cancel_reachable_from_every_open_stage() {
    let staff = Actor::staff("lara");
    let path = [
        Action::Assign {
            technician: "lara".to_string(),
        },
        Action::Start,
        Action::MarkReady,
    ];

    for depth in 0..=path.len() {
        let (engine, _) = engine();
        let request = engine.submit(submission(), &staff).await.unwrap();
        for action in path.iter().take(depth) {
            engine.apply_action(request.id, action.clone(), &staff).await.unwrap();
        }
        let before = engine.get(request.id).await.unwrap();
        assert!(!before.status.is_terminal());

        let canceled = engine
            .apply_action(request.id, Action::Cancel { reason: Some("   ".to_string()) }, &staff)
            .await
            .unwrap();
        assert_eq!(canceled.status, Stage::Canceled);
        assert_eq!(canceled.cancellation_reason, None);
        assert!(canceled.assigned_to.is_some());
    }
}
