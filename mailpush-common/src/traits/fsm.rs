pub trait FiniteStateMachine {
    type Input;
    type Context;

    /// Consume the current state and produce the next one for `input`
    #[must_use]
    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self;
}
