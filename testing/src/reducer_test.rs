//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use chairbook_core::effect::Effect;
use chairbook_core::reducer::Reducer;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion = Box<dyn FnOnce(&[Effect])>;

/// Type alias for output assertion functions
type OutputAssertion<O> = Box<dyn FnOnce(&O)>;

/// Type alias for rejection assertion functions
type RejectionAssertion<E> = Box<dyn FnOnce(&E)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// A test expects success unless [`then_rejection`](Self::then_rejection)
/// is used. Rejected commands are also checked to leave the state
/// untouched.
///
/// # Example
///
/// ```ignore
/// use chairbook_testing::ReducerTest;
///
/// ReducerTest::new(SchedulerReducer::new())
///     .with_env(fixtures::frozen_env())
///     .given_state(seed.state())
///     .when_action(SchedulerAction::CreateBooking(request))
///     .then_output(|outcome| {
///         assert_eq!(outcome.booking().unwrap().status, BookingStatus::Unverified);
///     })
///     .then_effects(|effects| {
///         assert_eq!(effects.len(), 2);
///     })
///     .run();
/// ```
pub struct ReducerTest<R>
where
    R: Reducer,
{
    reducer: R,
    environment: Option<R::Environment>,
    initial_state: Option<R::State>,
    action: Option<R::Action>,
    state_assertions: Vec<StateAssertion<R::State>>,
    effect_assertions: Vec<EffectAssertion>,
    output_assertions: Vec<OutputAssertion<R::Output>>,
    rejection_assertion: Option<RejectionAssertion<R::Error>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
    R::State: Clone + PartialEq + std::fmt::Debug,
    R::Output: std::fmt::Debug,
    R::Error: std::fmt::Debug,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
            output_assertions: Vec::new(),
            rejection_assertion: None,
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the returned output (Then)
    #[must_use]
    pub fn then_output<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::Output) + 'static,
    {
        self.output_assertions.push(Box::new(assertion));
        self
    }

    /// Expect the command to be rejected (Then)
    #[must_use]
    pub fn then_rejection<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::Error) + 'static,
    {
        self.rejection_assertion = Some(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set, if the
    /// outcome is not the expected kind, or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let before = state.clone();
        let result = self.reducer.reduce(&mut state, action, &env);

        match (result, self.rejection_assertion) {
            (Ok(reduction), None) => {
                for assertion in self.output_assertions {
                    assertion(&reduction.output);
                }
                for assertion in self.effect_assertions {
                    assertion(&reduction.effects);
                }
            },
            (Err(rejection), Some(assertion)) => {
                assert_eq!(state, before, "A rejected command must not change state");
                assertion(&rejection);
            },
            (Ok(reduction), Some(_)) => {
                panic!("Expected a rejection, got {:?}", reduction.output)
            },
            (Err(rejection), None) => panic!("Unexpected rejection: {rejection:?}"),
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use chairbook_core::effect::{Change, Effect, NotificationKind};

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects(effects: &[Effect]) {
        assert!(
            effects.is_empty(),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count(effects: &[Effect], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Notification kinds in emission order
    #[must_use]
    pub fn notified_kinds(effects: &[Effect]) -> Vec<NotificationKind> {
        effects
            .iter()
            .filter_map(Effect::intent)
            .map(|intent| intent.kind)
            .collect()
    }

    /// Assert exactly one notification of `kind`
    ///
    /// # Panics
    ///
    /// Panics if there is not exactly one.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_notifies(effects: &[Effect], kind: NotificationKind) {
        let kinds = notified_kinds(effects);
        assert_eq!(
            kinds.iter().filter(|k| **k == kind).count(),
            1,
            "Expected one {kind:?} notification, found {kinds:?}"
        );
    }

    /// Assert that no notification is emitted
    ///
    /// # Panics
    ///
    /// Panics if any `Notify` effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_silent(effects: &[Effect]) {
        let kinds = notified_kinds(effects);
        assert!(kinds.is_empty(), "Expected no notifications, found {kinds:?}");
    }

    /// Assert that a booking snapshot is published
    ///
    /// # Panics
    ///
    /// Panics if no booking `Publish` effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_publishes_booking(effects: &[Effect]) {
        assert!(
            effects.iter().any(|e| matches!(
                e,
                Effect::Publish(event) if matches!(event.change, Change::Booking(_))
            )),
            "Expected a booking Publish effect, none found in {effects:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chairbook_core::effect::ChangeEvent;
    use chairbook_core::reducer::Reduction;
    use chairbook_core::types::{Shop, ShopId};
    use chairbook_core::smallvec;

    #[derive(Clone, Debug, PartialEq)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        Decrement,
    }

    struct TestReducer;

    struct TestEnv;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;
        type Output = i32;
        type Error = String;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Result<Reduction<i32>, String> {
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    Ok(Reduction::new(state.count, smallvec![]))
                },
                TestAction::Decrement if state.count == 0 => Err("already zero".to_string()),
                TestAction::Decrement => {
                    state.count -= 1;
                    Ok(Reduction::new(state.count, smallvec![]))
                },
            }
        }
    }

    #[test]
    fn success_runs_output_and_effect_assertions() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Increment)
            .then_state(|state| assert_eq!(state.count, 1))
            .then_output(|count| assert_eq!(*count, 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn rejection_keeps_state() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Decrement)
            .then_rejection(|reason| assert_eq!(reason, "already zero"))
            .then_state(|state| assert_eq!(state.count, 0))
            .run();
    }

    #[test]
    #[should_panic(expected = "Unexpected rejection")]
    fn unexpected_rejection_fails_the_test() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Decrement)
            .run();
    }

    #[test]
    fn publish_only_effects_are_silent() {
        let shop = Shop::new(ShopId::new(), "Fades");
        let effects = [Effect::Publish(ChangeEvent::shop(&shop))];
        assertions::assert_silent(&effects);
        assertions::assert_effects_count(&effects, 1);
        assert!(assertions::notified_kinds(&effects).is_empty());
    }
}
