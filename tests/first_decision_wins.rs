use promise_cell::{promise, Error};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Attempt {
    Complete(i64),
    Fail(String),
    Cancel(bool),
}

fn arb_attempt() -> impl Strategy<Value = Attempt> {
    prop_oneof![
        any::<i64>().prop_map(Attempt::Complete),
        "[a-z]{1,8}".prop_map(Attempt::Fail),
        any::<bool>().prop_map(Attempt::Cancel),
    ]
}

proptest! {
    /// However many competing decisions arrive, only the first one sticks.
    #[test]
    fn first_attempt_decides(attempts in prop::collection::vec(arb_attempt(), 1..12)) {
        let (promise, future) = promise::<i64>();
        let results: Vec<bool> = attempts
            .iter()
            .map(|attempt| match attempt {
                Attempt::Complete(v) => promise.complete(*v),
                Attempt::Fail(msg) => promise.complete_with_error(msg.clone()),
                Attempt::Cancel(may_interrupt) => promise.cancel(*may_interrupt),
            })
            .collect();

        prop_assert!(results[0]);
        prop_assert!(results[1..].iter().all(|won| !won));
        prop_assert!(future.is_done());

        match (&attempts[0], future.get()) {
            (Attempt::Complete(v), Ok(got)) => prop_assert_eq!(*v, got),
            (Attempt::Fail(msg), Err(Error::Failed(cause))) => {
                prop_assert_eq!(msg.clone(), cause.to_string())
            }
            (Attempt::Cancel(_), Err(Error::Cancelled)) => prop_assert!(future.is_cancelled()),
            (attempt, outcome) => {
                prop_assert!(false, "{:?} produced {:?}", attempt, outcome)
            }
        }
    }
}
